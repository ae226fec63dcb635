//! Session and transport configuration.

use peerprep_core::{Role, RoomId, UserId};

/// Static transport configuration for NAT traversal.
#[derive(Debug, Clone)]
pub struct RtcConfig {
    /// Public reflection (STUN) server URLs.
    pub stun_servers: Vec<String>,
    /// How many candidates the transport may pre-gather.
    pub ice_candidate_pool_size: u8,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![
                "stun:stun1.l.google.com:19302".to_string(),
                "stun:stun2.l.google.com:19302".to_string(),
            ],
            ice_candidate_pool_size: 10,
        }
    }
}

/// Identity and role of one party for one session attempt.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The shared room this session negotiates through.
    pub room_id: RoomId,
    /// This party's identity.
    pub user_id: UserId,
    /// The other party's identity, when known at start time.
    pub peer_id: Option<UserId>,
    /// This party's fixed role.
    pub role: Role,
}

impl SessionConfig {
    /// Create a config with the role inferred from peer knowledge.
    ///
    /// A party without a peer identifier becomes the caller (the private
    /// invite flow); a party handed one becomes the callee. Matched finders
    /// know their peer but still initiate, so they override the inference
    /// via [`SessionConfig::with_role`].
    #[must_use]
    pub fn new(room_id: RoomId, user_id: UserId, peer_id: Option<UserId>) -> Self {
        let role = Role::from_peer(peer_id.as_ref());
        Self {
            room_id,
            user_id,
            peer_id,
            role,
        }
    }

    /// Override the inferred role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}
