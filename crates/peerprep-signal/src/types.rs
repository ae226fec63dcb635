//! Wire-shaped types exchanged through the signaling store.
//!
//! These types mirror what a hosted document backend would persist: the
//! room document with its offer/answer pair, candidate records, and
//! matchmaking queue entries.

use chrono::{DateTime, Utc};
use peerprep_core::{QueueEntryId, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// The kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Proposed by the session initiator.
    Offer,
    /// Returned by the responder.
    Answer,
}

/// A negotiated description of one side's media capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Whether this description is an offer or an answer.
    #[serde(rename = "type")]
    pub kind: SdpKind,
    /// The raw SDP payload.
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description.
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description.
    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One discovered network-connectivity candidate.
///
/// The payload is opaque to the store; it is produced by one transport and
/// consumed verbatim by the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// The serialized candidate line.
    pub candidate: String,
    /// Media stream identification tag, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description this candidate belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

impl IceCandidate {
    /// Create a candidate from a raw candidate line.
    #[must_use]
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// The shared signaling document for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDoc {
    /// Session description proposed by the caller. Written at most once,
    /// before the callee reads the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
    /// Session description returned by the callee. Written at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
    /// The parties of the session, when known at creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserId>>,
}

impl RoomDoc {
    /// Create the initial room document carrying the caller's offer.
    #[must_use]
    pub fn with_offer(offer: SessionDescription, users: Vec<UserId>) -> Self {
        Self {
            offer: Some(offer),
            answer: None,
            users: if users.is_empty() { None } else { Some(users) },
        }
    }
}

/// One user waiting for a random peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Store-owned entry identifier.
    pub entry_id: QueueEntryId,
    /// The waiting user.
    pub user_id: UserId,
    /// Whether the entry is still claimable.
    pub waiting: bool,
    /// When the user started searching.
    pub created_at: DateTime<Utc>,
}

/// The result of atomically claiming a waiting queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedEntry {
    /// The entry that was consumed.
    pub entry_id: QueueEntryId,
    /// The user who was waiting; becomes the claimer's peer.
    pub user_id: UserId,
}

/// The match payload delivered to a claimed entrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchNotice {
    /// The room generated by the claimer.
    pub room_id: RoomId,
    /// The claimer's identity.
    pub peer_id: UserId,
}

/// Observable lifecycle of one queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntryState {
    /// Still in the queue, claimable.
    Waiting,
    /// Consumed by a matcher; carries the room to join.
    Matched(MatchNotice),
    /// Removed without a match (timeout self-cancellation).
    Removed,
}
