//! Per-participant WebRTC stream sessions.
//!
//! A [`Stream`] negotiates one peer connection (publish or subscribe), relays
//! its SDP through a [`SignalingClient`] and fans the resulting media out to
//! the displays registered on it.

pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod hark;
pub mod logger;
pub mod media;
pub mod peer;
pub mod room;
pub mod signaling;
pub mod stream;
mod utils;

pub use capture::{CaptureConstraints, MediaCapture, SampleCapture, VideoConstraints};
pub use config::Config;
pub use error::{CaptureError, Error, Result};
pub use events::{EventBus, RoomEvent, StreamEvent, StreamInfo};
pub use hark::{HarkFactory, HarkOptions, SpeechDetector, SpeechDetectorFactory, SpeechEvent};
pub use media::{MediaStream, MediaTrack, TrackKind};
pub use peer::{
    EngineError, IceCandidate, NegotiationEngine, PeerHandle, PeerOptions, Role, ServerConfig,
    WebRtcEngine,
};
pub use room::{Participant, Room, SignalingParticipant};
pub use signaling::{SignalingClient, SignalingError};
pub use stream::{
    Container, DisplaySurface, NegotiationState, Stream, StreamContext, StreamOptions,
    SurfaceHandle, VideoSink,
};
