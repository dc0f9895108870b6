use crate::peer::state::PeerState;
use crate::peer::types::IceCandidate;
use crate::peer::EngineError;
use std::sync::atomic::Ordering;
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::RTCPeerConnection;

pub fn from_rtc(cand: &RTCIceCandidate, connection_id: &str) -> Option<IceCandidate> {
    match cand.to_json() {
        Ok(init) => Some(IceCandidate {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            connection_id: connection_id.to_string(),
        }),
        Err(e) => {
            warn!(error = %e, "failed to serialise local candidate");
            None
        }
    }
}

pub fn to_init(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: None,
    }
}

/// Applies a remote candidate now, or queues it until the answer is applied
pub async fn add_or_queue(
    pc: &RTCPeerConnection,
    state: &PeerState,
    candidate: IceCandidate,
) -> Result<(), EngineError> {
    if state.is_closed() {
        return Err(EngineError::Closed);
    }

    if !state.remote_description_set.load(Ordering::SeqCst) {
        debug!(connection_id = %state.connection_id, "remote description not set yet, queuing candidate");
        state.pending_remote_candidates.lock().push(candidate);
        return Ok(());
    }

    pc.add_ice_candidate(to_init(candidate)).await?;
    Ok(())
}

/// Drains candidates that arrived ahead of the remote description
pub async fn apply_pending_candidates(pc: &RTCPeerConnection, state: &PeerState) {
    for candidate in state.take_pending_candidates() {
        debug!(candidate = %candidate.candidate, "applying pending candidate");
        if let Err(e) = pc.add_ice_candidate(to_init(candidate)).await {
            warn!(error = %e, "failed to apply pending candidate");
        }
    }
}
