//! Error types for stream sessions

use crate::peer::EngineError;
use crate::signaling::SignalingError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a media capture capability
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    /// The platform (or the user) refused access to the devices
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No device can satisfy the constraints
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Constraints asked for neither audio nor video
    #[error("constraints request neither audio nor video")]
    NothingRequested,

    /// Track construction failed inside the media stack
    #[error("capture failed: {0}")]
    Internal(String),
}

/// Errors surfaced by [`crate::stream::Stream`] operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Capture acquisition rejected by the platform
    #[error("capture denied: {0}")]
    CaptureDenied(#[from] CaptureError),

    /// Negotiation engine could not build a peer (or its offer) for the chosen role
    #[error("peer construction failed: {0}")]
    PeerConstructionFailed(String),

    /// Remote coordinator answered the offer with an error
    #[error("signaling failed: {0}")]
    SignalingFailed(#[from] SignalingError),

    /// Engine refused the SDP answer
    #[error("remote description rejected: {0}")]
    RemoteDescriptionRejected(String),

    /// Engine refused a remote ICE candidate
    #[error("ICE candidate rejected: {0}")]
    IceCandidateRejected(String),

    /// `send_data` before any peer exists
    #[error("WebRTC peer has not been created yet")]
    PeerNotReady,

    /// `send_data` while the data channel is closed
    #[error("data channel is not opened")]
    ChannelNotOpen,

    /// The peer accepted the payload but the channel write failed
    #[error("data channel send failed: {0}")]
    SendFailed(String),

    /// Operation reserved for the other stream direction
    #[error("{operation} requires a {expected} stream")]
    WrongDirection {
        operation: &'static str,
        expected: &'static str,
    },

    /// Negotiation already started on this stream
    #[error("stream has already started negotiating")]
    AlreadyNegotiated,

    /// Stream disposed before the operation could complete
    #[error("stream has been disposed")]
    Disposed,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn peer(err: EngineError) -> Self {
        Error::PeerConstructionFailed(err.to_string())
    }

    pub(crate) fn remote_description(err: EngineError) -> Self {
        Error::RemoteDescriptionRejected(err.to_string())
    }

    /// Terminal failure of a negotiation attempt
    pub fn is_negotiation_failure(&self) -> bool {
        matches!(
            self,
            Error::CaptureDenied(_)
                | Error::PeerConstructionFailed(_)
                | Error::SignalingFailed(_)
                | Error::RemoteDescriptionRejected(_)
        )
    }

    /// Precondition failure the caller may retry after observing state changes
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::PeerNotReady | Error::ChannelNotOpen)
    }
}
