use crate::config::Config;
use crate::logger::{analyze_candidates, dump_candidate};
use crate::media::{MediaStream, MediaTrack, TrackKind};
use crate::peer::data_channel::attach_dc;
use crate::peer::ice;
use crate::peer::state::{PeerState, CLOSE_TIMEOUT};
use crate::peer::types::{IceCandidate, OfferConstraints, Role, ServerConfig};
use crate::peer::{EngineError, NegotiationEngine, PeerHandle, PeerOptions};
use crate::utils::{add_ice_url_scheme, random_id};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::{data_channel_init::RTCDataChannelInit, RTCDataChannel};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpHeaderExtensionCapability, RTCRtpParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// RFC 6464 client-to-mixer audio level header extension
pub const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";

/// Negotiation engine backed by webrtc-rs
#[derive(Debug, Clone)]
pub struct WebRtcEngine {
    ice_servers: Vec<ServerConfig>,
}

impl WebRtcEngine {
    pub fn new(ice_servers: Vec<ServerConfig>) -> Self {
        Self { ice_servers }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ice_servers.clone())
    }

    fn build_api(&self) -> Result<API, EngineError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        media_engine.register_header_extension(
            RTCRtpHeaderExtensionCapability {
                uri: AUDIO_LEVEL_URI.to_owned(),
            },
            RTPCodecType::Audio,
            None,
        )?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        Ok(APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build())
    }

    fn rtc_config(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: rtc_ice_servers(&self.ice_servers),
            ice_candidate_pool_size: 10,
            bundle_policy: RTCBundlePolicy::MaxBundle,
            rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
            ..Default::default()
        }
    }
}

impl Default for WebRtcEngine {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub fn rtc_ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

fn transceiver(direction: RTCRtpTransceiverDirection) -> Option<RTCRtpTransceiverInit> {
    Some(RTCRtpTransceiverInit {
        direction,
        send_encodings: vec![],
    })
}

#[async_trait]
impl NegotiationEngine for WebRtcEngine {
    async fn create_peer(&self, options: PeerOptions) -> Result<Arc<dyn PeerHandle>, EngineError> {
        let api = self.build_api()?;
        let pc = Arc::new(api.new_peer_connection(self.rtc_config()).await?);

        let connection_id = random_id();
        let remote_media = options
            .role
            .receives()
            .then(|| MediaStream::new(format!("remote-{connection_id}"), Vec::new()));
        let state = Arc::new(PeerState::new(connection_id, remote_media));

        info!(connection_id = %state.connection_id, role = ?options.role, "creating peer connection");

        match configure(&pc, &state, &options).await {
            Ok(dc) => Ok(Arc::new(WebRtcPeer {
                pc,
                dc,
                local_media: options.local_media,
                role: options.role,
                state,
            })),
            Err(e) => {
                warn!(connection_id = %state.connection_id, error = %e, "peer setup failed, closing");
                let _ = pc.close().await;
                Err(e)
            }
        }
    }
}

async fn configure(
    pc: &Arc<RTCPeerConnection>,
    state: &Arc<PeerState>,
    options: &PeerOptions,
) -> Result<Option<Arc<RTCDataChannel>>, EngineError> {
    let st = state.clone();
    let on_ice = options.on_ice_candidate.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        match cand {
            Some(c) => {
                if let Some(candidate) = ice::from_rtc(&c, &st.connection_id) {
                    dump_candidate("LOCAL", &candidate);
                    st.local_candidates.lock().push(candidate.clone());
                    on_ice(candidate);
                }
            }
            None => {
                // end of gathering
                analyze_candidates(&st.local_candidates.lock());
            }
        }
        Box::pin(async {})
    }));

    let connection_id = state.connection_id.clone();
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        debug!(connection_id = %connection_id, state = ?st, "peer connection state changed");
        Box::pin(async {})
    }));

    if let Some(remote) = state.remote_media.clone() {
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let remote = remote.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    _ => TrackKind::Video,
                };
                let media_track = MediaTrack::with_id(track.id(), kind);
                debug!(track = %media_track.id(), ?kind, "remote track added");
                remote.add_track(media_track.clone());
                if kind == TrackKind::Audio {
                    tokio::spawn(read_audio_levels(track, media_track));
                }
            })
        }));
    }

    match options.role {
        Role::SendRecv | Role::SendOnly => {
            let media = options
                .local_media
                .as_ref()
                .ok_or(EngineError::NoLocalMedia(options.role))?;
            let direction = if options.role == Role::SendRecv {
                RTCRtpTransceiverDirection::Sendrecv
            } else {
                RTCRtpTransceiverDirection::Sendonly
            };
            for track in media.tracks() {
                if let Some(local) = track.local_track() {
                    pc.add_transceiver_from_track(
                        local.clone() as Arc<dyn TrackLocal + Send + Sync>,
                        transceiver(direction),
                    )
                    .await?;
                }
            }
        }
        Role::RecvOnly => {
            let constraints = options.offer_constraints.unwrap_or(OfferConstraints {
                offer_to_receive_audio: true,
                offer_to_receive_video: true,
            });
            debug!(?constraints, "receive-only offer constraints");
            if constraints.offer_to_receive_audio {
                pc.add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    transceiver(RTCRtpTransceiverDirection::Recvonly),
                )
                .await?;
            }
            if constraints.offer_to_receive_video {
                pc.add_transceiver_from_kind(
                    RTPCodecType::Video,
                    transceiver(RTCRtpTransceiverDirection::Recvonly),
                )
                .await?;
            }
        }
    }

    match &options.data_channel {
        Some(config) => {
            let dc = pc
                .create_data_channel(&config.label, Some(RTCDataChannelInit::default()))
                .await?;
            attach_dc(&dc, config);
            Ok(Some(dc))
        }
        None => Ok(None),
    }
}

/// Extracts the level (-dBov) from an audio level extension payload
pub fn parse_audio_level(payload: &[u8]) -> Option<u8> {
    payload.first().map(|b| b & 0x7f)
}

/// Negotiated id of the audio level extension, if any
pub fn audio_level_extension_id(params: &RTCRtpParameters) -> Option<u8> {
    params
        .header_extensions
        .iter()
        .find(|ext| ext.uri == AUDIO_LEVEL_URI)
        .map(|ext| ext.id as u8)
}

async fn read_audio_levels(track: Arc<TrackRemote>, media_track: Arc<MediaTrack>) {
    let params = track.params();
    let Some(ext_id) = audio_level_extension_id(&params) else {
        debug!(track = %media_track.id(), "audio level extension not negotiated");
        return;
    };

    loop {
        let (packet, _) = match track.read_rtp().await {
            Ok(packet) => packet,
            Err(e) => {
                debug!(track = %media_track.id(), error = %e, "remote audio ended");
                break;
            }
        };
        if media_track.is_stopped() {
            break;
        }
        if let Some(level) = packet
            .header
            .get_extension(ext_id)
            .and_then(|payload| parse_audio_level(&payload))
        {
            media_track.set_audio_level(level);
        }
    }
}

pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
    dc: Option<Arc<RTCDataChannel>>,
    local_media: Option<MediaStream>,
    role: Role,
    state: Arc<PeerState>,
}

impl WebRtcPeer {
    pub fn connection_id(&self) -> &str {
        &self.state.connection_id
    }

    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }
}

#[async_trait]
impl PeerHandle for WebRtcPeer {
    fn role(&self) -> Role {
        self.role
    }

    async fn generate_offer(&self) -> Result<String, EngineError> {
        if self.state.is_closed() {
            return Err(EngineError::Closed);
        }

        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer).await?;
        // Trickle ICE: the offer goes out without waiting for gathering.
        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| EngineError::Other("local description missing after offer".into()))?;
        Ok(local.sdp)
    }

    async fn set_remote_description(&self, sdp_answer: &str) -> Result<(), EngineError> {
        if self.state.is_closed() {
            return Err(EngineError::Closed);
        }

        let answer = RTCSessionDescription::answer(sdp_answer.to_owned())?;
        self.pc.set_remote_description(answer).await?;
        self.state
            .remote_description_set
            .store(true, Ordering::SeqCst);
        ice::apply_pending_candidates(&self.pc, &self.state).await;
        Ok(())
    }

    fn remote_media(&self) -> Option<MediaStream> {
        if self.state.remote_description_set.load(Ordering::SeqCst) {
            self.state.remote_media.clone()
        } else {
            None
        }
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        ice::add_or_queue(&self.pc, &self.state, candidate).await
    }

    async fn send(&self, data: Bytes) -> Result<(), EngineError> {
        if self.state.is_closed() {
            return Err(EngineError::Closed);
        }
        let dc = self.dc.as_ref().ok_or(EngineError::NoDataChannel)?;
        dc.send(&data).await?;
        Ok(())
    }

    async fn dispose(&self) {
        if !self.state.mark_closed() {
            return;
        }
        for media in [&self.local_media, &self.state.remote_media].into_iter().flatten() {
            media.stop_all();
        }
        match timeout(CLOSE_TIMEOUT, self.pc.close()).await {
            Ok(Ok(())) => info!(connection_id = %self.state.connection_id, "peer connection closed"),
            Ok(Err(e)) => warn!(connection_id = %self.state.connection_id, error = %e, "error closing peer connection"),
            Err(_) => warn!(connection_id = %self.state.connection_id, "timed out closing peer connection"),
        }
    }
}
