//! Matchmaking operations.
//!
//! Free functions generic over the signaling store, mirroring how the
//! session coordinator consumes the same boundary. The double-match race
//! (two finders reading the same waiting entry) is resolved by the store's
//! transactional claim: exactly one finder consumes an entry, the other
//! falls through to queueing itself.

use std::time::Duration;

use peerprep_core::{QueueEntryId, Role, RoomId, UserId};
use peerprep_signal::{QueueEntryState, SignalStore};

use crate::error::Result;
use crate::types::{Invite, MatchConfig, MatchOutcome, MatchedPeer};

/// Look for a waiting peer, or queue the searcher.
///
/// If any entry is waiting, it is claimed atomically: a fresh room
/// identifier is generated, the entrant is notified with it, and the finder
/// returns `Matched` with the caller role. Otherwise the searcher is
/// inserted into the queue and returns `Queued` with the entry identifier
/// it needs for self-cancellation.
///
/// # Errors
///
/// Returns `MatchError::ServiceUnavailable` if the queue store is
/// unreachable; no retry is attempted.
pub async fn find_or_queue<S: SignalStore>(store: &S, user_id: &UserId) -> Result<MatchOutcome> {
    let room_id = RoomId::generate();

    if let Some(claimed) = store.claim_waiting(&room_id, user_id).await? {
        tracing::debug!(%room_id, peer = %claimed.user_id, "peer found");
        return Ok(MatchOutcome::Matched(MatchedPeer {
            room_id,
            peer_id: claimed.user_id,
            role: Role::Caller,
        }));
    }

    let entry_id = store.enqueue(user_id).await?;
    Ok(MatchOutcome::Queued { entry_id })
}

/// Wait for a queued search to be claimed, up to `timeout`.
///
/// Returns the match (with the callee role) if a finder claims the entry in
/// time. On timeout the entry is self-cancelled via
/// [`cancel_if_still_waiting`] and `None` is returned; if the claim and the
/// timeout race, the claim wins and the match is still reported.
///
/// # Errors
///
/// Returns `MatchError::ServiceUnavailable` if the queue store is
/// unreachable.
pub async fn await_match<S: SignalStore>(
    store: &S,
    entry_id: &QueueEntryId,
    timeout: Duration,
) -> Result<Option<MatchedPeer>> {
    let mut watch = store.watch_queue_entry(entry_id).await?;

    let resolved = tokio::time::timeout(timeout, watch.resolved()).await;
    match resolved {
        Ok(QueueEntryState::Matched(notice)) => Ok(Some(MatchedPeer {
            room_id: notice.room_id,
            peer_id: notice.peer_id,
            role: Role::Callee,
        })),
        Ok(QueueEntryState::Waiting | QueueEntryState::Removed) => Ok(None),
        Err(_elapsed) => {
            let removed = cancel_if_still_waiting(store, entry_id).await?;
            if removed {
                tracing::debug!(%entry_id, "search timed out, entry cancelled");
                return Ok(None);
            }
            // A matcher claimed the entry just as the timer fired; the
            // terminal state is already published.
            match watch.resolved().await {
                QueueEntryState::Matched(notice) => Ok(Some(MatchedPeer {
                    room_id: notice.room_id,
                    peer_id: notice.peer_id,
                    role: Role::Callee,
                })),
                QueueEntryState::Waiting | QueueEntryState::Removed => Ok(None),
            }
        }
    }
}

/// Run one complete search against the queue.
///
/// Convenience over [`find_or_queue`] followed by [`await_match`] with the
/// configured timeout. Returns `None` if nobody showed up in time.
///
/// # Errors
///
/// Returns `MatchError::ServiceUnavailable` if the queue store is
/// unreachable.
pub async fn search<S: SignalStore>(
    store: &S,
    user_id: &UserId,
    config: &MatchConfig,
) -> Result<Option<MatchedPeer>> {
    match find_or_queue(store, user_id).await? {
        MatchOutcome::Matched(matched) => Ok(Some(matched)),
        MatchOutcome::Queued { entry_id } => {
            await_match(store, &entry_id, config.search_timeout).await
        }
    }
}

/// Remove the queue entry if it is still waiting.
///
/// Inherently racy with concurrent matchers by design: an entry claimed
/// moments earlier is already gone, and deleting it again is treated as
/// success. Returns whether anything was actually removed.
///
/// # Errors
///
/// Returns `MatchError::ServiceUnavailable` if the queue store is
/// unreachable.
pub async fn cancel_if_still_waiting<S: SignalStore>(
    store: &S,
    entry_id: &QueueEntryId,
) -> Result<bool> {
    Ok(store.remove_if_waiting(entry_id).await?)
}

/// Create a private invite room.
///
/// No queue interaction: a room identifier is generated and handed back
/// immediately. The inviting party becomes the caller; whoever opens the
/// invite link later becomes the callee.
#[must_use]
pub fn create_private_room(user_id: &UserId) -> Invite {
    Invite {
        room_id: RoomId::generate(),
        user_id: user_id.clone(),
    }
}
