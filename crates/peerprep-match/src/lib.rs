//! Random-peer matchmaking for peerprep.
//!
//! This crate pairs users looking for a practice partner. A searcher either
//! claims an already-waiting entry (becoming the session caller) or queues
//! itself and waits to be claimed (becoming the callee). Unmatched searches
//! time out and self-cancel.
//!
//! # Flow
//!
//! ```text
//!  find_or_queue ──┬── entry waiting? ── claim (atomic) ──▶ Matched { room, peer, Caller }
//!                  │
//!                  └── queue empty ──── enqueue ──────────▶ Queued { entry_id }
//!                                                               │
//!                                          await_match ◀───────┘
//!                                      ┌───────┴────────┐
//!                              claimed by a finder   timeout
//!                                      │                 │
//!                     Matched { room, peer, Callee }   cancel_if_still_waiting
//! ```
//!
//! Failure semantics: store unavailability surfaces as one
//! `MatchError::ServiceUnavailable`; no automatic retry is attempted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod matchmaker;
pub mod types;

pub use error::{MatchError, Result};
pub use matchmaker::{
    await_match, cancel_if_still_waiting, create_private_room, find_or_queue, search,
};
pub use types::{Invite, MatchConfig, MatchOutcome, MatchedPeer};

// Re-export commonly used types from dependencies for convenience
pub use peerprep_core::{QueueEntryId, Role, RoomId, UserId};
