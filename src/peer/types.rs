use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// ICE candidate relayed between the engine and the signaling layer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
    pub connection_id: String, // correlates candidates with the peer that produced them
}

/// ICE server entry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Negotiation role, fixed when the peer is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SendRecv,
    SendOnly,
    RecvOnly,
}

impl Role {
    pub fn select(local: bool, loopback: bool) -> Self {
        match (local, loopback) {
            (true, true) => Role::SendRecv,
            (true, false) => Role::SendOnly,
            (false, _) => Role::RecvOnly,
        }
    }

    pub fn sends(self) -> bool {
        matches!(self, Role::SendRecv | Role::SendOnly)
    }

    pub fn receives(self) -> bool {
        matches!(self, Role::SendRecv | Role::RecvOnly)
    }
}

/// Offer constraints for the receive-only role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferConstraints {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
}

pub type IceCandidateCallback = Arc<dyn Fn(IceCandidate) + Send + Sync>;
pub type ChannelCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct DataChannelConfig {
    pub label: String,
    pub on_open: ChannelCallback,
    pub on_close: ChannelCallback,
}

impl std::fmt::Debug for DataChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChannelConfig")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
