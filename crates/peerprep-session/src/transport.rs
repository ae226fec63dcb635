//! Real-time transport boundary.
//!
//! The transport (a WebRTC peer connection in production) is an external
//! collaborator. Its free-form callbacks are modeled as a single-consumer
//! event channel so the session driver consumes everything in one place
//! instead of mutating shared state from ad hoc handlers.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use peerprep_signal::{IceCandidate, SessionDescription};

use crate::media::{MediaStream, MediaTrack};
use crate::state::ConnectionState;

/// Events the transport reports back to the session driver.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local connectivity candidate was discovered.
    LocalCandidate(IceCandidate),
    /// The remote party's media arrived.
    RemoteStream(MediaStream),
    /// The connectivity state changed.
    ConnectionStateChanged(ConnectionState),
}

/// Errors from the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Offer/answer negotiation failed.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// The transport was already closed.
    #[error("transport closed")]
    Closed,
}

/// The peer-connection collaborator.
///
/// One live transport exists per room attempt; the coordinator never lets
/// two transports for the same room identifier coexist.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Attach one local track to the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed.
    async fn add_local_track(&self, track: Arc<MediaTrack>) -> Result<(), TransportError>;

    /// Create a session-description offer.
    ///
    /// # Errors
    ///
    /// Returns an error if negotiation fails.
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    /// Create a session-description answer to the applied remote offer.
    ///
    /// # Errors
    ///
    /// Returns an error if negotiation fails.
    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    /// Apply a local session description.
    ///
    /// # Errors
    ///
    /// Returns an error if negotiation fails.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    /// Apply the remote party's session description.
    ///
    /// # Errors
    ///
    /// Returns an error if negotiation fails.
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    /// Feed one remote connectivity candidate into the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate is malformed or the transport is
    /// closed.
    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    /// Take the single-consumer event channel.
    ///
    /// Returns `None` if the events were already taken; exactly one driver
    /// may consume them.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;

    /// Close the transport. Idempotent; no further events are emitted.
    async fn close(&self);
}

/// Constructs one transport per session attempt.
pub trait TransportFactory: Send + Sync {
    /// Create a transport configured with the given relay/reflection servers.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be constructed.
    fn create(&self, config: &crate::config::RtcConfig)
        -> Result<Arc<dyn PeerTransport>, TransportError>;
}
