//! Matchmaking result and configuration types.

use std::time::Duration;

use peerprep_core::{QueueEntryId, Role, RoomId, UserId};

/// Matchmaker configuration.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// How long an unmatched search waits before self-cancelling.
    pub search_timeout: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            search_timeout: Duration::from_secs(30),
        }
    }
}

/// The result of one `find_or_queue` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A waiting peer was claimed; the session can start immediately.
    Matched(MatchedPeer),
    /// No peer was waiting; the searcher is now queued.
    Queued {
        /// Entry identifier for later self-cancellation.
        entry_id: QueueEntryId,
    },
}

/// A resolved pairing: the shared room plus the assigned role.
///
/// The finder is always the caller; the claimed entrant is the callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPeer {
    /// The freshly generated room both parties join.
    pub room_id: RoomId,
    /// The other party's identity.
    pub peer_id: UserId,
    /// This party's role in the session.
    pub role: Role,
}

/// A private practice room invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    /// The room the invite link points at.
    pub room_id: RoomId,
    /// The inviting party's identity (the future caller).
    pub user_id: UserId,
}
