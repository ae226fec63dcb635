//! Signaling store layer for peerprep.
//!
//! This crate defines the document-oriented signaling boundary that the
//! matchmaker and the session coordinator share, plus an in-process
//! implementation used by tests and single-host deployments.
//!
//! # Architecture
//!
//! The store holds two kinds of shared state:
//!
//! - `rooms`: one document per session, carrying the offer/answer exchange,
//!   with two append-only candidate logs per room (one per role)
//! - `queue`: waiting entries for random peer matching, claimed atomically
//!   by at most one finder
//!
//! Both support live subscriptions: room documents are observed as
//! snapshots, candidate logs as an added-records change feed that replays
//! existing records before streaming new ones.
//!
//! # Example
//!
//! ```no_run
//! use peerprep_signal::{MemoryStore, RoomDoc, SessionDescription, SignalStore};
//! use peerprep_core::RoomId;
//!
//! # async fn example() -> peerprep_signal::Result<()> {
//! let store = MemoryStore::new();
//! let room_id = RoomId::generate();
//!
//! let doc = RoomDoc::with_offer(SessionDescription::offer("v=0..."), vec![]);
//! store.create_room(&room_id, doc).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod types;
pub mod watch;

pub use error::{Result, SignalError};
pub use memory::MemoryStore;
pub use types::{
    ClaimedEntry, IceCandidate, MatchNotice, QueueEntry, QueueEntryState, RoomDoc, SdpKind,
    SessionDescription,
};
pub use watch::{CandidateFeed, QueueEntryWatch, RoomWatch};

use async_trait::async_trait;
use peerprep_core::{QueueEntryId, Role, RoomId, UserId};

/// The signaling store trait defining all shared-state operations.
///
/// This trait abstracts the external signaling service, allowing different
/// backends (in-memory for tests and single-host use, a hosted document
/// store in production). All operations are asynchronous and may fail or be
/// delayed arbitrarily; none block other concurrent sessions.
#[async_trait]
pub trait SignalStore: Send + Sync {
    // =========================================================================
    // Room Operations
    // =========================================================================

    /// Create (or overwrite) the room document.
    ///
    /// The caller writes the room exactly once, carrying the offer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn create_room(&self, room_id: &RoomId, doc: RoomDoc) -> Result<()>;

    /// Get the room document by ID, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomDoc>>;

    /// Partially update the room document with the callee's answer.
    ///
    /// # Errors
    ///
    /// Returns `SignalError::RoomNotFound` if the room has vanished (the
    /// peer hung up between the callee's read and this write).
    async fn set_answer(&self, room_id: &RoomId, answer: SessionDescription) -> Result<()>;

    /// Delete the room document and both candidate logs as one atomic batch.
    ///
    /// Deleting an already-absent room is a no-op; either party may invoke
    /// this during teardown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn delete_room(&self, room_id: &RoomId) -> Result<()>;

    /// Subscribe to live snapshots of the room document.
    ///
    /// The watch observes the current state immediately and every subsequent
    /// change, including deletion (a `None` snapshot). Subscribing to a room
    /// that does not exist yet is allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn watch_room(&self, room_id: &RoomId) -> Result<RoomWatch>;

    // =========================================================================
    // Candidate Operations
    // =========================================================================

    /// Append a connectivity candidate to the given role's log for the room.
    ///
    /// Each party only ever appends to its own log.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn add_candidate(
        &self,
        room_id: &RoomId,
        from: Role,
        candidate: IceCandidate,
    ) -> Result<()>;

    /// Subscribe to the added-records change feed of one candidate log.
    ///
    /// Records already present are replayed first, then new appends stream
    /// live. Each party only ever listens on the other side's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn watch_candidates(&self, room_id: &RoomId, from: Role) -> Result<CandidateFeed>;

    // =========================================================================
    // Queue Operations
    // =========================================================================

    /// Insert a waiting queue entry for the given user.
    ///
    /// Returns the store-owned entry identifier used for later
    /// self-cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn enqueue(&self, user_id: &UserId) -> Result<QueueEntryId>;

    /// Atomically claim one waiting entry, if any exists.
    ///
    /// The claim is transactional: lookup, removal, and notification of the
    /// claimed entrant (with the generated `room_id` and the claimer's
    /// identity) happen as one step, so two concurrent claimers can never
    /// consume the same entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn claim_waiting(
        &self,
        room_id: &RoomId,
        claimer: &UserId,
    ) -> Result<Option<ClaimedEntry>>;

    /// Remove the entry if it is still waiting.
    ///
    /// Returns `true` if an entry was removed, `false` if it was already
    /// gone (claimed by a concurrent matcher); already-gone is success, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn remove_if_waiting(&self, entry_id: &QueueEntryId) -> Result<bool>;

    /// Subscribe to the lifecycle of one queue entry.
    ///
    /// The watch observes `Waiting`, then either `Matched` (carrying the
    /// room and peer) or `Removed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn watch_queue_entry(&self, entry_id: &QueueEntryId) -> Result<QueueEntryWatch>;
}
