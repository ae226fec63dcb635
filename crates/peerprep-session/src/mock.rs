//! Mock collaborators for tests.
//!
//! Available in-crate and to downstream test suites via the `test-utils`
//! feature. The mock transport records every negotiation call and lets the
//! test inject events as if the network had produced them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use peerprep_signal::{IceCandidate, SessionDescription};

use crate::config::RtcConfig;
use crate::media::{MediaError, MediaSource, MediaStream, MediaTrack, TrackKind};
use crate::state::ConnectionState;
use crate::transport::{PeerTransport, TransportError, TransportEvent, TransportFactory};

enum CaptureOutcome {
    Grant,
    Deny,
    Unavailable(String),
}

/// A media source that grants, denies, or fails capture on demand.
pub struct MockMediaSource {
    outcome: CaptureOutcome,
    captured: AtomicUsize,
    streams: Mutex<Vec<MediaStream>>,
}

impl MockMediaSource {
    fn with_outcome(outcome: CaptureOutcome) -> Self {
        Self {
            outcome,
            captured: AtomicUsize::new(0),
            streams: Mutex::new(Vec::new()),
        }
    }

    /// A source that grants an audio+video stream.
    #[must_use]
    pub fn granting() -> Self {
        Self::with_outcome(CaptureOutcome::Grant)
    }

    /// A source that simulates the user denying permission.
    #[must_use]
    pub fn denying() -> Self {
        Self::with_outcome(CaptureOutcome::Deny)
    }

    /// A source that simulates a missing capture device.
    #[must_use]
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::with_outcome(CaptureOutcome::Unavailable(detail.into()))
    }

    /// How many capture requests were made.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.captured.load(Ordering::SeqCst)
    }

    /// Streams handed out by successful captures, in order.
    #[must_use]
    pub fn captured_streams(&self) -> Vec<MediaStream> {
        self.streams.lock().clone()
    }
}

#[async_trait]
impl MediaSource for MockMediaSource {
    async fn capture(&self) -> Result<MediaStream, MediaError> {
        let n = self.captured.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            CaptureOutcome::Grant => {
                let stream = MediaStream::new(vec![
                    Arc::new(MediaTrack::new(TrackKind::Audio, format!("mock-audio-{n}"))),
                    Arc::new(MediaTrack::new(TrackKind::Video, format!("mock-video-{n}"))),
                ]);
                self.streams.lock().push(stream.clone());
                Ok(stream)
            }
            CaptureOutcome::Deny => Err(MediaError::PermissionDenied),
            CaptureOutcome::Unavailable(detail) => {
                Err(MediaError::DeviceUnavailable(detail.clone()))
            }
        }
    }
}

/// A transport that records negotiation calls and replays injected events.
pub struct MockTransport {
    local_tracks: Mutex<Vec<Arc<MediaTrack>>>,
    local_description: Mutex<Option<SessionDescription>>,
    remote_description: Mutex<Option<SessionDescription>>,
    remote_description_sets: AtomicUsize,
    remote_candidates: Mutex<Vec<IceCandidate>>,
    closed: AtomicBool,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl MockTransport {
    /// Create an open transport with an untaken event channel.
    #[must_use]
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            local_tracks: Mutex::new(Vec::new()),
            local_description: Mutex::new(None),
            remote_description: Mutex::new(None),
            remote_description_sets: AtomicUsize::new(0),
            remote_candidates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Inject an event as if the network had produced it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Inject a discovered local candidate.
    pub fn emit_local_candidate(&self, candidate: IceCandidate) {
        self.emit(TransportEvent::LocalCandidate(candidate));
    }

    /// Inject a remote media arrival.
    pub fn emit_remote_stream(&self, stream: MediaStream) {
        self.emit(TransportEvent::RemoteStream(stream));
    }

    /// Inject a connectivity-state change.
    pub fn emit_connection_state(&self, state: ConnectionState) {
        self.emit(TransportEvent::ConnectionStateChanged(state));
    }

    /// Tracks attached via `add_local_track`.
    #[must_use]
    pub fn local_tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.local_tracks.lock().clone()
    }

    /// The last local description applied.
    #[must_use]
    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local_description.lock().clone()
    }

    /// The remote description applied, if any.
    #[must_use]
    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote_description.lock().clone()
    }

    /// How many times `set_remote_description` was called.
    #[must_use]
    pub fn remote_description_sets(&self) -> usize {
        self.remote_description_sets.load(Ordering::SeqCst)
    }

    /// Remote candidates fed into the transport, in arrival order.
    #[must_use]
    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.remote_candidates.lock().clone()
    }

    /// Whether `close` was invoked.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn add_local_track(&self, track: Arc<MediaTrack>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.local_tracks.lock().push(track);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        Ok(SessionDescription::offer("v=0 mock offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        if self.remote_description.lock().is_none() {
            return Err(TransportError::Negotiation(
                "no remote offer applied".to_string(),
            ));
        }
        Ok(SessionDescription::answer("v=0 mock answer"))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        *self.local_description.lock() = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        *self.remote_description.lock() = Some(desc);
        self.remote_description_sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.remote_candidates.lock().push(candidate);
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx.lock().take()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory that hands out mock transports and keeps handles for the test.
#[derive(Default)]
pub struct MockTransportFactory {
    created: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockTransportFactory {
    /// Create an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles to every transport created so far, in creation order.
    #[must_use]
    pub fn created(&self) -> Vec<Arc<MockTransport>> {
        self.created.lock().clone()
    }

    /// The single transport created by a one-session test.
    ///
    /// # Panics
    ///
    /// Panics if no transport has been created yet.
    #[must_use]
    pub fn only(&self) -> Arc<MockTransport> {
        self.created
            .lock()
            .first()
            .cloned()
            .expect("no transport created yet")
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, _config: &RtcConfig) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = Arc::new(MockTransport::new());
        self.created.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}
