//! Two-party media session coordination for peerprep.
//!
//! This crate establishes, maintains, and tears down one real-time
//! peer-practice session per [`PeerSession`] instance. It owns the session
//! state machine and drives the offer/answer and candidate exchange through
//! the shared signaling store; the actual media transport and capture
//! devices sit behind collaborator traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         UI layer                            │
//! │      (observes streams + connection state, hangs up)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PeerSession                           │
//! │  ┌─────────────┐ ┌──────────────┐ ┌─────────────────────┐   │
//! │  │  Signaling  │ │ Driver task  │ │  Session state      │   │
//! │  │  protocol   │ │ (one/session)│ │  machine            │   │
//! │  └─────────────┘ └──────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                │                │                │
//!                ▼                ▼                ▼
//!        ┌─────────────┐  ┌──────────────┐  ┌─────────────┐
//!        │ SignalStore │  │ PeerTransport│  │ MediaSource │
//!        │  (shared)   │  │ (STUN/ICE)   │  │ (cam + mic) │
//!        └─────────────┘  └──────────────┘  └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use peerprep_core::{RoomId, UserId};
//! use peerprep_session::{PeerSession, RtcConfig, SessionConfig};
//! use peerprep_signal::MemoryStore;
//! # use peerprep_session::{MediaSource, TransportFactory};
//!
//! # async fn example(
//! #     media: &dyn MediaSource,
//! #     factory: &dyn TransportFactory,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//!
//! // The inviter knows no peer yet, so this session takes the caller role.
//! let config = SessionConfig::new(RoomId::generate(), UserId::generate(), None);
//! let session = PeerSession::start(store, media, factory, RtcConfig::default(), config).await?;
//!
//! // ... UI observes session.local_stream() / session.is_peer_connected() ...
//!
//! session.hang_up().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod media;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod state;
pub mod transport;

pub use config::{RtcConfig, SessionConfig};
pub use coordinator::PeerSession;
pub use error::{Result, SessionError};
pub use media::{MediaError, MediaSource, MediaStream, MediaTrack, TrackKind};
pub use state::{ConnectionState, SessionState};
pub use transport::{PeerTransport, TransportError, TransportEvent, TransportFactory};

// Re-export commonly used types from dependencies for convenience
pub use peerprep_core::{Role, RoomId, UserId};
pub use peerprep_signal::{IceCandidate, SessionDescription, SignalStore};
