//! Error types for session coordination.
//!
//! Each variant maps to one user-facing condition; there is no structured
//! retry/backoff policy, so failures surface as a single human-readable
//! message.

use peerprep_core::RoomId;
use thiserror::Error;

use crate::media::MediaError;
use crate::transport::TransportError;

/// A result type using `SessionError`.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while establishing or running a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Camera/microphone access was denied. Terminal; the user must grant
    /// permission and start over.
    #[error("camera or microphone permission was denied - allow access and try again")]
    PermissionDenied,

    /// No usable capture device.
    #[error("media devices unavailable: {0}")]
    MediaUnavailable(String),

    /// The callee joined a room identifier with no matching document.
    /// Terminal; the user must obtain a valid invite link.
    #[error("room does not exist: {0} - check the invite link")]
    RoomNotFound(RoomId),

    /// The signaling store failed mid-negotiation.
    #[error("signaling error: {0}")]
    Signal(#[from] peerprep_signal::SignalError),

    /// The transport failed during negotiation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<MediaError> for SessionError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied => Self::PermissionDenied,
            MediaError::DeviceUnavailable(detail) => Self::MediaUnavailable(detail),
        }
    }
}
