//! Core types and utilities for peerprep.
//!
//! This crate provides the foundational types used throughout the peerprep
//! peer-practice platform:
//!
//! - **Identifiers**: Strongly-typed IDs for rooms, users, and queue entries
//! - **Roles**: The caller/callee tag fixed for the lifetime of a session
//!
//! # Example
//!
//! ```
//! use peerprep_core::{Role, RoomId, UserId};
//!
//! // Generate a room ID for a new session
//! let room_id = RoomId::generate();
//!
//! // Generate an opaque guest user ID
//! let user_id = UserId::generate();
//!
//! // The inviting party knows no peer yet, so it takes the caller role
//! let role = Role::from_peer(None);
//! assert_eq!(role, Role::Caller);
//! # let _ = (room_id, user_id);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod role;

pub use ids::{IdError, QueueEntryId, RoomId, UserId};
pub use role::Role;
