//! In-process signaling store implementation.
//!
//! This module provides the `MemoryStore` implementation of the
//! `SignalStore` trait. It backs tests and single-host deployments where
//! both parties run against the same process; a hosted document store
//! implements the same trait for the distributed case.
//!
//! Atomicity notes: the queue claim performs lookup, removal, and entrant
//! notification under one mutex, giving the transactional
//! read-one-then-delete semantics the matchmaker requires. Room teardown
//! removes the document and both candidate logs under one write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};

use peerprep_core::{QueueEntryId, Role, RoomId, UserId};

use crate::error::{Result, SignalError};
use crate::types::{
    ClaimedEntry, IceCandidate, MatchNotice, QueueEntry, QueueEntryState, RoomDoc,
    SessionDescription,
};
use crate::watch::{CandidateFeed, QueueEntryWatch, RoomWatch};
use crate::SignalStore;

/// One role's append-only candidate log with its live feeds.
#[derive(Default)]
struct CandidateLog {
    records: Vec<IceCandidate>,
    feeds: Vec<mpsc::UnboundedSender<IceCandidate>>,
}

impl CandidateLog {
    fn append(&mut self, candidate: IceCandidate) {
        self.records.push(candidate.clone());
        self.feeds.retain(|tx| tx.send(candidate.clone()).is_ok());
    }

    fn subscribe(&mut self) -> CandidateFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        // Replay existing records as adds before going live.
        for record in &self.records {
            let _ = tx.send(record.clone());
        }
        self.feeds.push(tx);
        CandidateFeed::new(rx)
    }

    fn clear(&mut self) {
        self.records.clear();
        // Dropping the senders ends every live feed.
        self.feeds.clear();
    }
}

/// Room document plus its candidate logs and document watch channel.
struct RoomSlot {
    doc_tx: watch::Sender<Option<RoomDoc>>,
    caller_log: CandidateLog,
    callee_log: CandidateLog,
}

impl RoomSlot {
    fn new() -> Self {
        let (doc_tx, _) = watch::channel(None);
        Self {
            doc_tx,
            caller_log: CandidateLog::default(),
            callee_log: CandidateLog::default(),
        }
    }

    fn log_mut(&mut self, from: Role) -> &mut CandidateLog {
        match from {
            Role::Caller => &mut self.caller_log,
            Role::Callee => &mut self.callee_log,
        }
    }
}

/// One waiting entry with its lifecycle watch channel.
struct QueueSlot {
    entry: QueueEntry,
    state_tx: watch::Sender<QueueEntryState>,
}

/// In-memory signaling store.
pub struct MemoryStore {
    rooms: RwLock<HashMap<RoomId, RoomSlot>>,
    queue: Mutex<Vec<QueueSlot>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Number of entries currently waiting in the queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of room slots currently held.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    fn with_slot<T>(&self, room_id: &RoomId, f: impl FnOnce(&mut RoomSlot) -> T) -> T {
        let mut rooms = self.rooms.write();
        let slot = rooms.entry(*room_id).or_insert_with(RoomSlot::new);
        f(slot)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    // =========================================================================
    // Room Operations
    // =========================================================================

    async fn create_room(&self, room_id: &RoomId, doc: RoomDoc) -> Result<()> {
        self.with_slot(room_id, |slot| {
            slot.doc_tx.send_replace(Some(doc));
        });
        tracing::debug!(%room_id, "room created");
        Ok(())
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomDoc>> {
        let rooms = self.rooms.read();
        Ok(rooms
            .get(room_id)
            .and_then(|slot| slot.doc_tx.borrow().clone()))
    }

    async fn set_answer(&self, room_id: &RoomId, answer: SessionDescription) -> Result<()> {
        let mut rooms = self.rooms.write();
        let slot = rooms
            .get_mut(room_id)
            .ok_or(SignalError::RoomNotFound(*room_id))?;

        let mut updated = slot
            .doc_tx
            .borrow()
            .clone()
            .ok_or(SignalError::RoomNotFound(*room_id))?;
        updated.answer = Some(answer);
        slot.doc_tx.send_replace(Some(updated));
        Ok(())
    }

    async fn delete_room(&self, room_id: &RoomId) -> Result<()> {
        let mut rooms = self.rooms.write();
        if let Some(mut slot) = rooms.remove(room_id) {
            // One batch under the lock: document plus both candidate logs.
            // Watchers see the deletion snapshot, then the channels close
            // as the slot drops.
            slot.doc_tx.send_replace(None);
            slot.caller_log.clear();
            slot.callee_log.clear();
            tracing::debug!(%room_id, "room deleted");
        }
        Ok(())
    }

    async fn watch_room(&self, room_id: &RoomId) -> Result<RoomWatch> {
        Ok(self.with_slot(room_id, |slot| RoomWatch::new(slot.doc_tx.subscribe())))
    }

    // =========================================================================
    // Candidate Operations
    // =========================================================================

    async fn add_candidate(
        &self,
        room_id: &RoomId,
        from: Role,
        candidate: IceCandidate,
    ) -> Result<()> {
        self.with_slot(room_id, |slot| slot.log_mut(from).append(candidate));
        Ok(())
    }

    async fn watch_candidates(&self, room_id: &RoomId, from: Role) -> Result<CandidateFeed> {
        Ok(self.with_slot(room_id, |slot| slot.log_mut(from).subscribe()))
    }

    // =========================================================================
    // Queue Operations
    // =========================================================================

    async fn enqueue(&self, user_id: &UserId) -> Result<QueueEntryId> {
        let entry = QueueEntry {
            entry_id: QueueEntryId::generate(),
            user_id: user_id.clone(),
            waiting: true,
            created_at: Utc::now(),
        };
        let entry_id = entry.entry_id;
        let (state_tx, _) = watch::channel(QueueEntryState::Waiting);
        self.queue.lock().push(QueueSlot { entry, state_tx });
        tracing::debug!(%entry_id, %user_id, "queued for matching");
        Ok(entry_id)
    }

    async fn claim_waiting(
        &self,
        room_id: &RoomId,
        claimer: &UserId,
    ) -> Result<Option<ClaimedEntry>> {
        let mut queue = self.queue.lock();
        // Skip the claimer's own entry should it race with itself.
        let position = queue.iter().position(|slot| slot.entry.user_id != *claimer);
        let Some(position) = position else {
            return Ok(None);
        };
        let slot = queue.remove(position);

        // Removal and notification happen under the same lock, so a second
        // claimer can never observe this entry.
        slot.state_tx.send_replace(QueueEntryState::Matched(MatchNotice {
            room_id: *room_id,
            peer_id: claimer.clone(),
        }));
        tracing::debug!(entry_id = %slot.entry.entry_id, %room_id, "queue entry claimed");

        Ok(Some(ClaimedEntry {
            entry_id: slot.entry.entry_id,
            user_id: slot.entry.user_id,
        }))
    }

    async fn remove_if_waiting(&self, entry_id: &QueueEntryId) -> Result<bool> {
        let mut queue = self.queue.lock();
        let Some(position) = queue.iter().position(|slot| slot.entry.entry_id == *entry_id)
        else {
            return Ok(false);
        };
        let slot = queue.remove(position);
        slot.state_tx.send_replace(QueueEntryState::Removed);
        Ok(true)
    }

    async fn watch_queue_entry(&self, entry_id: &QueueEntryId) -> Result<QueueEntryWatch> {
        let queue = self.queue.lock();
        let rx = queue
            .iter()
            .find(|slot| slot.entry.entry_id == *entry_id)
            .map_or_else(
                || {
                    // Entry already resolved (or never existed); the watch
                    // observes the terminal state immediately.
                    let (tx, rx) = watch::channel(QueueEntryState::Removed);
                    drop(tx);
                    rx
                },
                |slot| slot.state_tx.subscribe(),
            );
        Ok(QueueEntryWatch::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionDescription;

    fn offer_doc() -> RoomDoc {
        RoomDoc::with_offer(SessionDescription::offer("v=0 offer"), vec![])
    }

    #[tokio::test]
    async fn create_and_get_room() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();

        assert!(store.get_room(&room_id).await.unwrap().is_none());
        store.create_room(&room_id, offer_doc()).await.unwrap();

        let doc = store.get_room(&room_id).await.unwrap().unwrap();
        assert!(doc.offer.is_some());
        assert!(doc.answer.is_none());
    }

    #[tokio::test]
    async fn set_answer_updates_document() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();
        store.create_room(&room_id, offer_doc()).await.unwrap();

        store
            .set_answer(&room_id, SessionDescription::answer("v=0 answer"))
            .await
            .unwrap();

        let doc = store.get_room(&room_id).await.unwrap().unwrap();
        assert_eq!(doc.answer.unwrap().sdp, "v=0 answer");
    }

    #[tokio::test]
    async fn set_answer_on_missing_room_fails() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();

        let result = store
            .set_answer(&room_id, SessionDescription::answer("v=0"))
            .await;
        assert!(matches!(result, Err(SignalError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn delete_room_is_idempotent() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();
        store.create_room(&room_id, offer_doc()).await.unwrap();

        store.delete_room(&room_id).await.unwrap();
        assert!(store.get_room(&room_id).await.unwrap().is_none());

        // Deleting an already-absent room is a no-op.
        store.delete_room(&room_id).await.unwrap();
    }

    #[tokio::test]
    async fn delete_room_purges_candidate_logs() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();
        store.create_room(&room_id, offer_doc()).await.unwrap();
        store
            .add_candidate(&room_id, Role::Caller, IceCandidate::new("candidate:1"))
            .await
            .unwrap();

        store.delete_room(&room_id).await.unwrap();

        let mut feed = store.watch_candidates(&room_id, Role::Caller).await.unwrap();
        // No replayed records: the log was cleared with the room.
        let next = tokio::time::timeout(std::time::Duration::from_millis(50), feed.next()).await;
        assert!(next.is_err() || next.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_room_releases_the_slot() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();
        store.create_room(&room_id, offer_doc()).await.unwrap();
        let mut watch = store.watch_room(&room_id).await.unwrap();
        assert_eq!(store.room_count(), 1);

        store.delete_room(&room_id).await.unwrap();
        assert_eq!(store.room_count(), 0, "slot must not outlive the room");

        // The watcher observes the deletion snapshot, then the feed ends.
        assert_eq!(watch.changed().await, Some(None));
        assert!(watch.changed().await.is_none());
    }

    #[tokio::test]
    async fn room_watch_observes_answer() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();
        store.create_room(&room_id, offer_doc()).await.unwrap();

        let mut watch = store.watch_room(&room_id).await.unwrap();
        assert!(watch.snapshot().unwrap().answer.is_none());

        store
            .set_answer(&room_id, SessionDescription::answer("v=0 answer"))
            .await
            .unwrap();

        let snapshot = watch.changed().await.unwrap().unwrap();
        assert!(snapshot.answer.is_some());
    }

    #[tokio::test]
    async fn candidate_feed_replays_then_streams() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();

        store
            .add_candidate(&room_id, Role::Callee, IceCandidate::new("candidate:1"))
            .await
            .unwrap();

        let mut feed = store.watch_candidates(&room_id, Role::Callee).await.unwrap();
        assert_eq!(feed.next().await.unwrap().candidate, "candidate:1");

        store
            .add_candidate(&room_id, Role::Callee, IceCandidate::new("candidate:2"))
            .await
            .unwrap();
        assert_eq!(feed.next().await.unwrap().candidate, "candidate:2");
    }

    #[tokio::test]
    async fn candidate_logs_are_partitioned_by_role() {
        let store = MemoryStore::new();
        let room_id = RoomId::generate();

        store
            .add_candidate(&room_id, Role::Caller, IceCandidate::new("from-caller"))
            .await
            .unwrap();

        let mut callee_feed = store.watch_candidates(&room_id, Role::Callee).await.unwrap();
        let next =
            tokio::time::timeout(std::time::Duration::from_millis(50), callee_feed.next()).await;
        assert!(next.is_err(), "caller record must not reach the callee log");
    }

    #[tokio::test]
    async fn claim_is_exactly_once() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let waiting = UserId::generate();
        store.enqueue(&waiting).await.unwrap();

        let finder_a = UserId::generate();
        let finder_b = UserId::generate();
        let room_a = RoomId::generate();
        let room_b = RoomId::generate();

        let (a, b) = tokio::join!(
            store.claim_waiting(&room_a, &finder_a),
            store.claim_waiting(&room_b, &finder_b),
        );
        let claims = [a.unwrap(), b.unwrap()];
        let successes = claims.iter().filter(|c| c.is_some()).count();
        assert_eq!(successes, 1, "exactly one finder may consume the entry");
        assert_eq!(store.queue_len(), 0);
    }

    #[tokio::test]
    async fn claim_skips_own_entry() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.enqueue(&user).await.unwrap();

        let room_id = RoomId::generate();
        let claimed = store.claim_waiting(&room_id, &user).await.unwrap();
        assert!(claimed.is_none());
        assert_eq!(store.queue_len(), 1);
    }

    #[tokio::test]
    async fn claimed_entrant_is_notified_with_room() {
        let store = MemoryStore::new();
        let waiting = UserId::generate();
        let entry_id = store.enqueue(&waiting).await.unwrap();
        let mut watch = store.watch_queue_entry(&entry_id).await.unwrap();

        let finder = UserId::generate();
        let room_id = RoomId::generate();
        let claimed = store.claim_waiting(&room_id, &finder).await.unwrap().unwrap();
        assert_eq!(claimed.user_id, waiting);

        match watch.resolved().await {
            QueueEntryState::Matched(notice) => {
                assert_eq!(notice.room_id, room_id);
                assert_eq!(notice.peer_id, finder);
            }
            other => panic!("expected Matched, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn remove_if_waiting_is_idempotent() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        let entry_id = store.enqueue(&user).await.unwrap();

        assert!(store.remove_if_waiting(&entry_id).await.unwrap());
        // Removing twice does not error; it reports nothing removed.
        assert!(!store.remove_if_waiting(&entry_id).await.unwrap());
    }

    #[tokio::test]
    async fn watch_unknown_entry_reports_removed() {
        let store = MemoryStore::new();
        let mut watch = store
            .watch_queue_entry(&QueueEntryId::generate())
            .await
            .unwrap();
        assert_eq!(watch.resolved().await, QueueEntryState::Removed);
    }
}
