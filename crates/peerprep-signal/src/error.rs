//! Error types for the signaling store layer.

use peerprep_core::RoomId;
use thiserror::Error;

/// A result type using `SignalError`.
pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors that can occur during signaling store operations.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The store could not be reached.
    #[error("signaling store unavailable: {0}")]
    Unavailable(String),

    /// The room document does not exist.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
