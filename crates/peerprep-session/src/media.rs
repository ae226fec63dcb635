//! Local media capture boundary and stream handles.
//!
//! The coordinator owns one local stream per session; the UI holds cheap
//! cloned handles. Track toggling is purely local state (mute / camera off)
//! and never touches the signaling store or renegotiates the connection.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// The kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Microphone audio.
    Audio,
    /// Camera video.
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// One capture (or remote) track with its local enabled/stopped flags.
#[derive(Debug)]
pub struct MediaTrack {
    kind: TrackKind,
    id: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl MediaTrack {
    /// Create a new enabled, running track.
    #[must_use]
    pub fn new(kind: TrackKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    /// The track kind.
    #[must_use]
    pub const fn kind(&self) -> TrackKind {
        self.kind
    }

    /// The device-assigned track identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the track is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the enabled flag explicitly.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the enabled flag, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }

    /// Stop the track, releasing the underlying device.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether the track has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// A set of media tracks shared between the coordinator and the UI.
///
/// Cloning is cheap; all clones observe the same track flags.
#[derive(Debug, Clone)]
pub struct MediaStream {
    tracks: Arc<Vec<Arc<MediaTrack>>>,
}

impl MediaStream {
    /// Create a stream over the given tracks.
    #[must_use]
    pub fn new(tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self {
            tracks: Arc::new(tracks),
        }
    }

    /// All tracks in the stream.
    #[must_use]
    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    /// The first track of the given kind, if any.
    #[must_use]
    pub fn track(&self, kind: TrackKind) -> Option<&Arc<MediaTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    /// Stop every track in the stream.
    pub fn stop_all(&self) {
        for track in self.tracks.iter() {
            track.stop();
        }
    }
}

/// Errors from the media capture collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The user denied camera/microphone access. Terminal for the session;
    /// surfaced with a remediation hint and never retried.
    #[error("camera or microphone access was denied")]
    PermissionDenied,

    /// No usable capture device was found.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// The camera+microphone capture collaborator.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Request camera and microphone access and return the captured stream.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::PermissionDenied` on user denial, distinct from
    /// `MediaError::DeviceUnavailable`.
    async fn capture(&self) -> Result<MediaStream, MediaError>;
}
