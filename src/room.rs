//! The room a stream belongs to
//!
//! Streams report negotiation and speaking events to the room bus and keep the
//! room's "who is speaking" registry up to date.

use crate::config::DEFAULT_THRESHOLD_SPEAKER;
use crate::events::{EventBus, RoomEvent};
use crate::peer::IceCandidate;
use crate::signaling::{request, OnIceCandidate, SignalingClient};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Room {
    events: EventBus<RoomEvent>,
    speaking: Mutex<HashMap<String, DateTime<Utc>>>,
    threshold_speaker: f64,
}

impl Room {
    pub fn new(threshold_speaker: f64) -> Self {
        Self {
            events: EventBus::new(),
            speaking: Mutex::new(HashMap::new()),
            threshold_speaker,
        }
    }

    /// Volume (dB) above which a participant counts as speaking
    pub fn threshold_speaker(&self) -> f64 {
        self.threshold_speaker
    }

    pub fn add_participant_speaking(&self, participant_id: &str) {
        self.speaking
            .lock()
            .entry(participant_id.to_string())
            .or_insert_with(Utc::now);
    }

    pub fn remove_participant_speaking(&self, participant_id: &str) {
        self.speaking.lock().remove(participant_id);
    }

    /// Currently speaking participants, earliest speaker first
    pub fn participants_speaking(&self) -> Vec<String> {
        let speaking = self.speaking.lock();
        let mut entries: Vec<_> = speaking.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn is_speaking(&self, participant_id: &str) -> bool {
        self.speaking.lock().contains_key(participant_id)
    }

    pub fn emit(&self, event: RoomEvent) {
        debug!(event = event.name(), "room event");
        self.events.emit(event);
    }

    pub fn listen(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.listen()
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_SPEAKER)
    }
}

/// The participant that owns a stream
pub trait Participant: Send + Sync {
    fn id(&self) -> String;

    /// Relays a local ICE candidate for `endpoint` to the remote side
    fn send_ice_candidate(&self, endpoint: &str, candidate: IceCandidate);
}

/// Participant relaying candidates with the `onIceCandidate` request
pub struct SignalingParticipant {
    id: RwLock<String>,
    signaling: Arc<dyn SignalingClient>,
}

impl SignalingParticipant {
    pub fn new(id: impl Into<String>, signaling: Arc<dyn SignalingClient>) -> Self {
        Self {
            id: RwLock::new(id.into()),
            signaling,
        }
    }

    /// Renames the participant; streams pick the new id up on their next call
    pub fn set_id(&self, id: impl Into<String>) {
        *self.id.write() = id.into();
    }
}

impl Participant for SignalingParticipant {
    fn id(&self) -> String {
        self.id.read().clone()
    }

    fn send_ice_candidate(&self, endpoint: &str, candidate: IceCandidate) {
        let req = OnIceCandidate {
            endpoint_name: endpoint.to_string(),
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_m_line_index: candidate.sdp_mline_index,
        };
        let signaling = self.signaling.clone();
        let endpoint = endpoint.to_string();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(endpoint = %endpoint, "no tokio runtime, dropping ICE candidate");
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = request(signaling.as_ref(), &req).await {
                warn!(endpoint = %endpoint, error = %e, "failed to relay ICE candidate");
            }
        });
    }
}
