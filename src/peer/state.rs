use crate::media::MediaStream;
use crate::peer::types::IceCandidate;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How long a disposed peer waits for `close()` before giving up
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Mutable state of one webrtc peer, shared with its event handlers
#[derive(Debug)]
pub struct PeerState {
    pub connection_id: String,

    /// Remote candidates received before the remote description was applied
    pub pending_remote_candidates: Mutex<Vec<IceCandidate>>,

    /// Local candidates gathered so far, kept for diagnostics
    pub local_candidates: Mutex<Vec<IceCandidate>>,

    /// Set once the answer has been applied
    pub remote_description_set: AtomicBool,

    /// Filled by incoming tracks; present only for receiving roles
    pub remote_media: Option<MediaStream>,

    pub closed: AtomicBool,
}

impl PeerState {
    pub fn new(connection_id: String, remote_media: Option<MediaStream>) -> Self {
        Self {
            connection_id,
            pending_remote_candidates: Mutex::new(Vec::new()),
            local_candidates: Mutex::new(Vec::new()),
            remote_description_set: AtomicBool::new(false),
            remote_media,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Marks the peer closed; returns false if it already was
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn take_pending_candidates(&self) -> Vec<IceCandidate> {
        std::mem::take(&mut *self.pending_remote_candidates.lock())
    }
}
