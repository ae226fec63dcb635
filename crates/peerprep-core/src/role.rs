//! Session roles.
//!
//! A session has exactly two fixed roles. The role decides which candidate
//! log a party appends to, which one it listens on, and whether it produces
//! the offer or the answer.

use crate::ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed role of one party in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The initiator: creates the room document and the offer.
    Caller,
    /// The responder: reads the offer and writes the answer.
    Callee,
}

impl Role {
    /// Infer the role from peer knowledge at session start.
    ///
    /// A party that knows no peer identifier yet is the caller; a party that
    /// was handed a peer identifier (e.g. via an invite link) is the callee.
    /// Matched finders override this with an explicit role assignment.
    #[must_use]
    pub const fn from_peer(peer: Option<&UserId>) -> Self {
        match peer {
            None => Self::Caller,
            Some(_) => Self::Callee,
        }
    }

    /// The role on the other side of the session.
    #[must_use]
    pub const fn remote(self) -> Self {
        match self {
            Self::Caller => Self::Callee,
            Self::Callee => Self::Caller,
        }
    }

    /// Returns true if this party initiates the offer.
    #[must_use]
    pub const fn is_caller(self) -> bool {
        matches!(self, Self::Caller)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => write!(f, "caller"),
            Self::Callee => write!(f, "callee"),
        }
    }
}
