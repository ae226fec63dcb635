//! Live subscription handles.
//!
//! These wrap the store's notification channels so callers never touch the
//! underlying channel types directly. All handles end cleanly when the store
//! drops the feed (room deleted, entry resolved, store shut down).

use crate::types::{IceCandidate, QueueEntryState, RoomDoc};
use tokio::sync::{mpsc, watch};

/// A live subscription to one room document.
pub struct RoomWatch {
    rx: watch::Receiver<Option<RoomDoc>>,
}

impl RoomWatch {
    pub(crate) fn new(rx: watch::Receiver<Option<RoomDoc>>) -> Self {
        Self { rx }
    }

    /// The current snapshot of the document (`None` if it does not exist).
    #[must_use]
    pub fn snapshot(&self) -> Option<RoomDoc> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new snapshot.
    ///
    /// Returns `None` once the store has dropped the feed.
    pub async fn changed(&mut self) -> Option<Option<RoomDoc>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// An added-records change feed over one candidate log.
pub struct CandidateFeed {
    rx: mpsc::UnboundedReceiver<IceCandidate>,
}

impl CandidateFeed {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<IceCandidate>) -> Self {
        Self { rx }
    }

    /// Receive the next added candidate record.
    ///
    /// Existing records are replayed before live appends. Returns `None`
    /// once the log has been deleted.
    pub async fn next(&mut self) -> Option<IceCandidate> {
        self.rx.recv().await
    }
}

/// A subscription to the lifecycle of one queue entry.
pub struct QueueEntryWatch {
    rx: watch::Receiver<QueueEntryState>,
}

impl QueueEntryWatch {
    pub(crate) fn new(rx: watch::Receiver<QueueEntryState>) -> Self {
        Self { rx }
    }

    /// The current state of the entry.
    #[must_use]
    pub fn state(&self) -> QueueEntryState {
        self.rx.borrow().clone()
    }

    /// Wait until the entry leaves the `Waiting` state and return the
    /// terminal state.
    ///
    /// If the store drops the feed while the entry is still waiting, the
    /// entry is reported as `Removed`.
    pub async fn resolved(&mut self) -> QueueEntryState {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if !matches!(current, QueueEntryState::Waiting) {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return QueueEntryState::Removed;
            }
        }
    }
}
