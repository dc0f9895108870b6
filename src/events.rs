//! Typed publish/subscribe channels
//!
//! Every stream owns an [`EventBus<StreamEvent>`] for capture access events and
//! shares its room's [`EventBus<RoomEvent>`] for negotiation and speaking events.

use crate::error::CaptureError;
use tokio::sync::broadcast;
use tracing::trace;

const BUS_CAPACITY: usize = 64;

/// In-process broadcast channel with a fixed event vocabulary
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone + std::fmt::Debug> EventBus<E> {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Delivers to every current listener. Having none is not an error.
    pub fn emit(&self, event: E) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            trace!(?event, "event emitted without listeners");
        }
    }

    pub fn listen(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone + std::fmt::Debug> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a stream carried by room events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub id: String,
    pub global_id: String,
    pub local: bool,
}

/// Events on a stream's own bus
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    AccessAccepted,
    AccessDenied { error: CaptureError },
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::AccessAccepted => "access-accepted",
            StreamEvent::AccessDenied { .. } => "access-denied",
        }
    }
}

/// Events on the owning room's bus
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    StreamPublished { stream: StreamInfo },
    StreamSubscribed { stream: StreamInfo },
    StreamSpeaking { participant_id: String },
    StreamStoppedSpeaking { participant_id: String },
}

impl RoomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::StreamPublished { .. } => "stream-published",
            RoomEvent::StreamSubscribed { .. } => "stream-subscribed",
            RoomEvent::StreamSpeaking { .. } => "stream-speaking",
            RoomEvent::StreamStoppedSpeaking { .. } => "stream-stopped-speaking",
        }
    }
}
