//! Session and connection state machines.
//!
//! This module defines the per-session lifecycle and the transport-derived
//! connectivity state, and provides validation logic to ensure state
//! machine invariants are maintained.
//!
//! # State Machine
//!
//! ```text
//!   ┌────────┐        ┌────────────────┐        ┌─────────────┐
//!   │  Idle  │───────▶│ AcquiringMedia │───────▶│ Negotiating │
//!   └────────┘ (start)└────────────────┘ (media └──────┬──────┘
//!                                         acquired)    │ (transport
//!                                                      ▼  connected)
//!                                      ┌──────────────────┐
//!                              ┌──────▶│    Connected     │
//!                              │       └────────┬─────────┘
//!                     (transport        (transport drops)
//!                      recovers)                │
//!                              │       ┌────────▼─────────┐
//!                              └───────│   Disconnected   │
//!                                      └──────────────────┘
//!
//!   every non-terminal state ──(hang-up / teardown)──▶ Closed
//! ```
//!
//! `Closed` is terminal and is reached exactly once; re-invoking teardown
//! is idempotent.

use serde::{Deserialize, Serialize};

/// Lifecycle states for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing has happened yet.
    Idle,
    /// Camera and microphone access is being requested.
    AcquiringMedia,
    /// Media acquired, connection created, offer/answer in flight.
    Negotiating,
    /// The transport reports a live peer connection.
    Connected,
    /// The transport dropped; may recover if the transport does.
    Disconnected,
    /// Hang-up invoked or the session was torn down. Terminal.
    Closed,
}

/// Connectivity state derived live from the underlying transport.
///
/// Never persisted; surfaced to the UI as a simple "is peer connected"
/// boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport created, no negotiation yet.
    New,
    /// Negotiation in progress.
    Connecting,
    /// Media is flowing between the peers.
    Connected,
    /// Connectivity was lost; the transport may recover.
    Disconnected,
    /// Connectivity failed; no automatic reconnection is attempted.
    Failed,
    /// The transport was closed.
    Closed,
}

impl ConnectionState {
    /// The boolean the UI actually renders.
    #[must_use]
    pub const fn is_peer_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Check if a session state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::{AcquiringMedia, Closed, Connected, Disconnected, Idle, Negotiating};

    matches!(
        (from, to),
        // The happy path runs strictly forward
        (Idle, AcquiringMedia)
            | (AcquiringMedia, Negotiating)
            | (Negotiating, Connected)
            // Connectivity may drop and recover
            | (Connected | Negotiating, Disconnected)
            | (Disconnected, Connected)
            // Teardown is reachable from every non-terminal state
            | (Idle | AcquiringMedia | Negotiating | Connected | Disconnected, Closed)
    )
}

/// Apply a transport connectivity report to the session state.
///
/// Returns the new session state, or `None` if the report does not move the
/// session (e.g. connectivity updates after teardown).
#[must_use]
pub fn apply_connectivity(session: SessionState, connection: ConnectionState) -> Option<SessionState> {
    let target = match connection {
        ConnectionState::Connected => SessionState::Connected,
        ConnectionState::Disconnected | ConnectionState::Failed => SessionState::Disconnected,
        ConnectionState::New | ConnectionState::Connecting | ConnectionState::Closed => {
            return None;
        }
    };
    is_valid_transition(session, target).then_some(target)
}

/// Returns true if the session has reached its terminal state.
#[must_use]
pub const fn is_terminal(state: SessionState) -> bool {
    matches!(state, SessionState::Closed)
}

/// Returns true if the session holds live media resources.
#[must_use]
pub const fn holds_media(state: SessionState) -> bool {
    matches!(
        state,
        SessionState::Negotiating | SessionState::Connected | SessionState::Disconnected
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use SessionState::*;

        // Idle -> AcquiringMedia (start)
        assert!(is_valid_transition(Idle, AcquiringMedia));
        // AcquiringMedia -> Negotiating (media acquired)
        assert!(is_valid_transition(AcquiringMedia, Negotiating));
        // Negotiating -> Connected (transport connected)
        assert!(is_valid_transition(Negotiating, Connected));
        // Connected -> Disconnected (transport dropped)
        assert!(is_valid_transition(Connected, Disconnected));
        // Disconnected -> Connected (transport recovered)
        assert!(is_valid_transition(Disconnected, Connected));
        // Hang-up from anywhere live
        assert!(is_valid_transition(Negotiating, Closed));
        assert!(is_valid_transition(Connected, Closed));
        assert!(is_valid_transition(Disconnected, Closed));
    }

    #[test]
    fn invalid_transitions() {
        use SessionState::*;

        // Closed is terminal
        assert!(!is_valid_transition(Closed, Connected));
        assert!(!is_valid_transition(Closed, Idle));
        assert!(!is_valid_transition(Closed, Closed));
        // Can't connect before negotiating
        assert!(!is_valid_transition(Idle, Connected));
        assert!(!is_valid_transition(AcquiringMedia, Connected));
        // Can't go backwards
        assert!(!is_valid_transition(Connected, Negotiating));
        assert!(!is_valid_transition(Negotiating, AcquiringMedia));
    }

    #[test]
    fn connectivity_maps_to_session_state() {
        assert_eq!(
            apply_connectivity(SessionState::Negotiating, ConnectionState::Connected),
            Some(SessionState::Connected)
        );
        assert_eq!(
            apply_connectivity(SessionState::Connected, ConnectionState::Failed),
            Some(SessionState::Disconnected)
        );
        assert_eq!(
            apply_connectivity(SessionState::Disconnected, ConnectionState::Connected),
            Some(SessionState::Connected)
        );
    }

    #[test]
    fn connectivity_after_close_is_ignored() {
        assert_eq!(
            apply_connectivity(SessionState::Closed, ConnectionState::Connected),
            None
        );
        assert_eq!(
            apply_connectivity(SessionState::Closed, ConnectionState::Failed),
            None
        );
    }

    #[test]
    fn intermediate_connectivity_does_not_move_the_session() {
        assert_eq!(
            apply_connectivity(SessionState::Negotiating, ConnectionState::Connecting),
            None
        );
        assert_eq!(
            apply_connectivity(SessionState::Negotiating, ConnectionState::New),
            None
        );
    }

    #[test]
    fn peer_connected_boolean() {
        assert!(ConnectionState::Connected.is_peer_connected());
        assert!(!ConnectionState::Connecting.is_peer_connected());
        assert!(!ConnectionState::Disconnected.is_peer_connected());
        assert!(!ConnectionState::Failed.is_peer_connected());
    }

    #[test]
    fn terminal_state() {
        assert!(is_terminal(SessionState::Closed));
        assert!(!is_terminal(SessionState::Disconnected));
    }

    #[test]
    fn media_holding_states() {
        assert!(holds_media(SessionState::Negotiating));
        assert!(holds_media(SessionState::Connected));
        assert!(!holds_media(SessionState::Idle));
        assert!(!holds_media(SessionState::Closed));
    }
}
