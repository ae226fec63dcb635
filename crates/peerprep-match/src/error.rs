//! Error types for matchmaking operations.

use thiserror::Error;

/// A result type using `MatchError`.
pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors that can occur during matchmaking.
///
/// All store failures collapse into a single user-facing condition; the UI
/// lets the user retry manually rather than the matchmaker retrying itself.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The matching service could not be reached.
    #[error("matching service unavailable: {0}")]
    ServiceUnavailable(#[from] peerprep_signal::SignalError),
}
