use crate::peer::types::IceCandidate;
use tracing::{debug, trace, warn};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` overrides the compiled-in default.
pub fn init() {
    let enabled = crate::config::LOGGING_ENABLED && crate::config::dev::ENABLE_LOGGING;
    let fallback = if enabled { "stream_session=debug" } else { "off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A subscriber may already be installed (tests, host application).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Traces an ICE candidate as it is gathered (trickle ICE)
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    trace!(
        label,
        candidate = %cand.candidate,
        sdp_mid = ?cand.sdp_mid,
        sdp_mline_index = ?cand.sdp_mline_index,
        connection_id = %cand.connection_id,
        "trickle candidate"
    );
}

pub fn analyze_candidates(candidates: &[IceCandidate]) {
    let mut host_count = 0;
    let mut srflx_count = 0;
    let mut relay_count = 0;

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            host_count += 1;
        } else if candidate.candidate.contains("typ srflx") {
            srflx_count += 1;
        } else if candidate.candidate.contains("typ relay") {
            relay_count += 1;
        }
    }

    debug!(host_count, srflx_count, relay_count, "candidate analysis");

    if relay_count == 0 {
        warn!("no TURN relay candidates found, connections through NAT may fail");
    }
}
