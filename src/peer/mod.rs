//! Media negotiation engine
//!
//! The stream session only talks to [`NegotiationEngine`] and [`PeerHandle`];
//! [`connection::WebRtcEngine`] is the webrtc-rs implementation.

pub mod connection;
pub mod data_channel;
pub mod ice;
pub mod state;
pub mod types;

use crate::media::MediaStream;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub use connection::{WebRtcEngine, WebRtcPeer};
pub use types::{
    ChannelCallback, DataChannelConfig, IceCandidate, IceCandidateCallback, OfferConstraints,
    Role, ServerConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("role {0:?} needs local media")]
    NoLocalMedia(Role),

    #[error("no data channel was negotiated")]
    NoDataChannel,

    #[error("peer connection is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Everything the engine needs to build one peer
#[derive(Clone)]
pub struct PeerOptions {
    pub role: Role,
    pub local_media: Option<MediaStream>,
    pub on_ice_candidate: IceCandidateCallback,
    pub data_channel: Option<DataChannelConfig>,
    pub offer_constraints: Option<OfferConstraints>,
}

impl std::fmt::Debug for PeerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerOptions")
            .field("role", &self.role)
            .field("local_media", &self.local_media.as_ref().map(|m| m.id()))
            .field("data_channel", &self.data_channel)
            .field("offer_constraints", &self.offer_constraints)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    async fn create_peer(&self, options: PeerOptions) -> Result<Arc<dyn PeerHandle>, EngineError>;
}

#[async_trait]
pub trait PeerHandle: Send + Sync {
    fn role(&self) -> Role;

    /// Creates the SDP offer and installs it as the local description
    async fn generate_offer(&self) -> Result<String, EngineError>;

    /// Applies the remote SDP answer
    async fn set_remote_description(&self, sdp_answer: &str) -> Result<(), EngineError>;

    /// Media received from the remote side, once there is any
    fn remote_media(&self) -> Option<MediaStream>;

    /// Remote candidates may arrive before or after the answer
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    async fn send(&self, data: Bytes) -> Result<(), EngineError>;

    /// Releases the connection; idempotent
    async fn dispose(&self);
}
