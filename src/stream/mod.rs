//! Stream session
//!
//! A [`Stream`] is one local capture or one remote subscription. It drives a
//! single offer/answer negotiation through [`NegotiationState`], relays the SDP
//! over signaling and hands the resulting media to its display registry.
//!
//! Negotiation steps run strictly one after another. Disposal may happen while
//! a step is in flight; the step then releases whatever it acquired and returns
//! [`Error::Disposed`] without emitting events.

pub mod data_channel;
pub mod display;
pub mod speech;
pub mod state;

use crate::capture::{CaptureConstraints, MediaCapture, SampleCapture};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventBus, RoomEvent, StreamEvent, StreamInfo};
use crate::hark::{HarkFactory, SpeechDetector, SpeechDetectorFactory};
use crate::media::MediaStream;
use crate::peer::{
    IceCandidate, NegotiationEngine, OfferConstraints, PeerHandle, PeerOptions, Role,
    WebRtcEngine,
};
use crate::room::{Participant, Room};
use crate::signaling::{request, PublishVideo, ReceiveVideoFrom, SignalingClient};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub use data_channel::DataChannelState;
pub use display::{Container, DisplayRegistry, DisplaySurface, SurfaceHandle, VideoSink};
pub use state::NegotiationState;

const DEFAULT_STREAM_ID: &str = "webcam";
const DISPLAY_NAME_MAX: usize = 16;

/// Collaborators shared by every stream of a session
#[derive(Clone)]
pub struct StreamContext {
    pub signaling: Arc<dyn SignalingClient>,
    pub engine: Arc<dyn NegotiationEngine>,
    pub capture: Arc<dyn MediaCapture>,
    pub speech: Arc<dyn SpeechDetectorFactory>,
    pub room: Arc<Room>,
    pub constraints: CaptureConstraints,
}

impl StreamContext {
    /// webrtc-rs engine, sample capture and hark detection configured from `config`
    pub fn from_config(config: &Config, signaling: Arc<dyn SignalingClient>) -> Self {
        Self {
            signaling,
            engine: Arc::new(WebRtcEngine::from_config(config)),
            capture: Arc::new(SampleCapture::new()),
            speech: Arc::new(HarkFactory::new(config.hark.clone())),
            room: Arc::new(Room::new(config.threshold_speaker)),
            constraints: config.capture.clone(),
        }
    }
}

#[derive(Clone)]
pub struct StreamOptions {
    /// Defaults to `webcam`
    pub id: Option<String>,
    pub participant: Option<Arc<dyn Participant>>,
    pub recv_video: bool,
    pub recv_audio: bool,
    pub video: bool,
    pub audio: bool,
    /// Open a data channel alongside the media
    pub data: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            id: None,
            participant: None,
            recv_video: true,
            recv_audio: true,
            video: true,
            audio: true,
            data: false,
        }
    }
}

pub struct Stream {
    id: String,
    local: bool,
    recv_video: bool,
    recv_audio: bool,
    video: bool,
    audio: bool,
    data: bool,

    ctx: StreamContext,
    participant: RwLock<Option<Arc<dyn Participant>>>,
    events: EventBus<StreamEvent>,

    state: Mutex<NegotiationState>,
    media: RwLock<Option<MediaStream>>,
    peer: Mutex<Option<Arc<dyn PeerHandle>>>,
    speech: Mutex<Option<Box<dyn SpeechDetector>>>,
    /// Remote candidates that arrived before the peer existed
    pending_candidates: Mutex<Vec<IceCandidate>>,

    displays: DisplayRegistry,
    channel: DataChannelState,

    show_my_remote: AtomicBool,
    local_mirrored: AtomicBool,
}

impl Stream {
    pub fn new(ctx: StreamContext, local: bool, options: StreamOptions) -> Arc<Self> {
        let stream = Arc::new(Self {
            id: options.id.unwrap_or_else(|| DEFAULT_STREAM_ID.to_string()),
            local,
            recv_video: options.recv_video,
            recv_audio: options.recv_audio,
            video: options.video,
            audio: options.audio,
            data: options.data,
            ctx,
            participant: RwLock::new(options.participant),
            events: EventBus::new(),
            state: Mutex::new(NegotiationState::Idle),
            media: RwLock::new(None),
            peer: Mutex::new(None),
            speech: Mutex::new(None),
            pending_candidates: Mutex::new(Vec::new()),
            displays: DisplayRegistry::new(),
            channel: DataChannelState::default(),
            show_my_remote: AtomicBool::new(false),
            local_mirrored: AtomicBool::new(false),
        });
        debug!(stream = %stream.global_id(), local, "stream created");
        stream
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `<participant id>_<id>`, or `<id>_webcam` without a participant
    pub fn global_id(&self) -> String {
        match self.participant.read().as_ref() {
            Some(participant) => format!("{}_{}", participant.id(), self.id),
            None => format!("{}_webcam", self.id),
        }
    }

    /// Short label for thumbnails
    pub fn display_name(&self) -> String {
        let name = self.global_id().replace("_webcam", "");
        if name.chars().count() >= DISPLAY_NAME_MAX {
            format!("{}...", name.chars().take(DISPLAY_NAME_MAX).collect::<String>())
        } else {
            name
        }
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn recv_video(&self) -> bool {
        self.recv_video
    }

    pub fn recv_audio(&self) -> bool {
        self.recv_audio
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.lock()
    }

    pub fn media(&self) -> Option<MediaStream> {
        self.media.read().clone()
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            id: self.id.clone(),
            global_id: self.global_id(),
            local: self.local,
        }
    }

    pub fn events(&self) -> &EventBus<StreamEvent> {
        &self.events
    }

    pub fn listen(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.listen()
    }

    pub fn participant(&self) -> Option<Arc<dyn Participant>> {
        self.participant.read().clone()
    }

    pub fn set_participant(&self, participant: Option<Arc<dyn Participant>>) {
        *self.participant.write() = participant;
    }

    pub fn is_data_channel_enabled(&self) -> bool {
        self.data
    }

    pub fn is_data_channel_opened(&self) -> bool {
        self.channel.is_opened()
    }

    /// Next data channel label; never returns the same value twice
    pub fn channel_name(&self) -> String {
        self.channel.next_name(&self.global_id())
    }

    pub fn is_local_mirrored(&self) -> bool {
        self.local_mirrored.load(Ordering::SeqCst)
    }

    fn show_my_remote(&self) -> bool {
        self.show_my_remote.load(Ordering::SeqCst)
    }

    /// Asks the server to loop the published media back (send-receive role)
    pub fn subscribe_to_my_remote(&self) -> Result<()> {
        self.require_local("subscribe_to_my_remote")?;
        self.require_idle()?;
        self.show_my_remote.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Shows the local media back to the publisher, optionally replacing it
    pub fn mirror_local_stream(&self, media: Option<MediaStream>) -> Result<()> {
        self.require_local("mirror_local_stream")?;
        self.require_idle()?;
        self.show_my_remote.store(true, Ordering::SeqCst);
        self.local_mirrored.store(true, Ordering::SeqCst);
        if let Some(media) = media {
            *self.media.write() = Some(media.clone());
            self.displays.fan_out(&media);
        }
        Ok(())
    }

    fn require_local(&self, operation: &'static str) -> Result<()> {
        if self.local {
            Ok(())
        } else {
            Err(Error::WrongDirection {
                operation,
                expected: "local",
            })
        }
    }

    fn require_remote(&self, operation: &'static str) -> Result<()> {
        if self.local {
            Err(Error::WrongDirection {
                operation,
                expected: "remote",
            })
        } else {
            Ok(())
        }
    }

    fn require_idle(&self) -> Result<()> {
        match self.state() {
            NegotiationState::Idle => Ok(()),
            NegotiationState::Disposed => Err(Error::Disposed),
            _ => Err(Error::AlreadyNegotiated),
        }
    }

    fn capture_constraints(&self) -> CaptureConstraints {
        let mut constraints = self.ctx.constraints.clone();
        constraints.audio &= self.audio;
        constraints.video.enabled &= self.video;
        constraints
    }

    /// Requests camera and microphone access
    pub async fn start_capture(&self) -> Result<()> {
        self.require_local("start_capture")?;
        if self.state() == NegotiationState::Disposed {
            return Err(Error::Disposed);
        }

        let constraints = self.capture_constraints();
        match self.ctx.capture.get_user_media(&constraints).await {
            Ok(media) => {
                if self.state() == NegotiationState::Disposed {
                    media.stop_all();
                    return Err(Error::Disposed);
                }
                info!(stream = %self.global_id(), media = %media.id(), "access accepted");
                let previous = self.media.write().replace(media.clone());
                if let Some(previous) = previous {
                    previous.stop_all();
                }
                self.displays.fan_out(&media);
                self.events.emit(StreamEvent::AccessAccepted);
                Ok(())
            }
            Err(e) => {
                if self.state() == NegotiationState::Disposed {
                    return Err(Error::Disposed);
                }
                warn!(stream = %self.global_id(), error = %e, "access denied");
                self.events.emit(StreamEvent::AccessDenied { error: e.clone() });
                Err(Error::CaptureDenied(e))
            }
        }
    }

    /// Negotiates the local media with the server
    pub async fn publish(self: &Arc<Self>) -> Result<()> {
        self.require_local("publish")?;
        self.negotiate().await
    }

    /// Negotiates reception of this remote stream
    pub async fn subscribe(self: &Arc<Self>) -> Result<()> {
        self.require_remote("subscribe")?;
        self.negotiate().await
    }

    async fn negotiate(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            let current = *state;
            match current {
                NegotiationState::Idle => *state = NegotiationState::PeerCreating,
                NegotiationState::Disposed => return Err(Error::Disposed),
                _ => return Err(Error::AlreadyNegotiated),
            }
        }

        let role = Role::select(self.local, self.show_my_remote());
        debug!(stream = %self.global_id(), ?role, "creating peer");

        let peer = match self.ctx.engine.create_peer(self.peer_options(role)).await {
            Ok(peer) => peer,
            Err(e) => return Err(self.fail(Error::peer(e))),
        };
        if let Err(e) = self.install_peer(&peer).await {
            peer.dispose().await;
            return Err(e);
        }

        let offer = match peer.generate_offer().await {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail(Error::peer(e))),
        };
        self.transition(NegotiationState::OfferGenerated)?;

        let answer = if self.local {
            request(
                self.ctx.signaling.as_ref(),
                &PublishVideo {
                    sdp_offer: offer,
                    do_loopback: self.show_my_remote(),
                },
            )
            .await
        } else {
            request(
                self.ctx.signaling.as_ref(),
                &ReceiveVideoFrom {
                    sender: self.global_id(),
                    sdp_offer: offer,
                },
            )
            .await
        };

        match answer {
            Ok(answer) => self.process_answer(&peer, &answer.sdp_answer).await,
            Err(e) => Err(self.fail(Error::SignalingFailed(e))),
        }
    }

    fn peer_options(self: &Arc<Self>, role: Role) -> PeerOptions {
        let weak = Arc::downgrade(self);
        let on_ice_candidate = Arc::new(move |candidate: IceCandidate| {
            let Some(stream) = weak.upgrade() else {
                return;
            };
            match stream.participant() {
                Some(participant) => {
                    participant.send_ice_candidate(&stream.global_id(), candidate)
                }
                None => debug!(stream = %stream.global_id(), "no participant to relay ICE candidate"),
            }
        });

        let (local_media, data_channel, offer_constraints) = if role.sends() {
            let data_channel = self
                .data
                .then(|| self.channel.config(self.channel_name()));
            (self.media(), data_channel, None)
        } else {
            let constraints = OfferConstraints {
                offer_to_receive_audio: self.recv_audio,
                offer_to_receive_video: self.recv_video,
            };
            (None, None, Some(constraints))
        };

        PeerOptions {
            role,
            local_media,
            on_ice_candidate,
            data_channel,
            offer_constraints,
        }
    }

    async fn install_peer(&self, peer: &Arc<dyn PeerHandle>) -> Result<()> {
        {
            let state = self.state.lock();
            if *state == NegotiationState::Disposed {
                debug!(stream = %self.global_id(), "peer created after dispose, releasing");
                return Err(Error::Disposed);
            }
            *self.peer.lock() = Some(peer.clone());
        }

        let queued = std::mem::take(&mut *self.pending_candidates.lock());
        for candidate in queued {
            if let Err(e) = peer.add_ice_candidate(candidate).await {
                warn!(stream = %self.global_id(), error = %e, "queued ICE candidate rejected");
            }
        }
        Ok(())
    }

    async fn process_answer(self: &Arc<Self>, peer: &Arc<dyn PeerHandle>, sdp_answer: &str) -> Result<()> {
        self.transition(NegotiationState::AnswerPending)?;

        if self.local {
            self.ctx.room.emit(RoomEvent::StreamPublished { stream: self.info() });
        }

        if let Err(e) = peer.set_remote_description(sdp_answer).await {
            return Err(self.fail(Error::remote_description(e)));
        }
        self.transition(NegotiationState::Established)?;
        info!(stream = %self.global_id(), "negotiation established");

        // A send-only peer never carries the publisher's own echo.
        if !peer.role().receives() {
            return Ok(());
        }

        match peer.remote_media() {
            Some(remote) => {
                *self.media.write() = Some(remote.clone());
                self.displays.fan_out(&remote);
                self.attach_speech(&remote);
            }
            None => warn!(stream = %self.global_id(), "established without remote media"),
        }
        self.ctx.room.emit(RoomEvent::StreamSubscribed { stream: self.info() });
        Ok(())
    }

    fn attach_speech(self: &Arc<Self>, media: &MediaStream) {
        let detector = speech::attach(self, media);
        if let Some(previous) = self.speech.lock().replace(detector) {
            previous.stop();
        }
        if self.state() == NegotiationState::Disposed {
            if let Some(detector) = self.speech.lock().take() {
                detector.stop();
            }
        }
    }

    fn transition(&self, next: NegotiationState) -> Result<()> {
        let mut state = self.state.lock();
        if *state == NegotiationState::Disposed {
            debug!(stream = %self.global_id(), next = %next, "continuation after dispose ignored");
            return Err(Error::Disposed);
        }
        if !state.can_transition_to(next) {
            warn!(stream = %self.global_id(), from = %*state, to = %next, "unexpected transition");
        }
        debug!(stream = %self.global_id(), from = %*state, to = %next, "negotiation state");
        *state = next;
        Ok(())
    }

    /// Moves to `Failed` unless the stream was disposed meanwhile
    fn fail(&self, err: Error) -> Error {
        let mut state = self.state.lock();
        if *state == NegotiationState::Disposed {
            debug!(stream = %self.global_id(), error = %err, "failure after dispose ignored");
            return Error::Disposed;
        }
        error!(stream = %self.global_id(), state = %*state, error = %err, "negotiation failed");
        *state = NegotiationState::Failed;
        err
    }

    /// Forwards a remote ICE candidate, queuing it until a peer exists
    pub async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if self.state() == NegotiationState::Disposed {
            return Err(Error::Disposed);
        }

        let peer = {
            let mut pending = self.pending_candidates.lock();
            match self.peer.lock().clone() {
                Some(peer) => peer,
                None => {
                    debug!(stream = %self.global_id(), "no peer yet, queuing ICE candidate");
                    pending.push(candidate);
                    return Ok(());
                }
            }
        };
        peer.add_ice_candidate(candidate)
            .await
            .map_err(|e| Error::IceCandidateRejected(e.to_string()))
    }

    /// Sends over the data channel; nothing is queued while it is closed
    pub async fn send_data(&self, data: impl Into<Bytes>) -> Result<()> {
        let peer = self.peer.lock().clone().ok_or(Error::PeerNotReady)?;
        if !self.channel.is_opened() {
            return Err(Error::ChannelNotOpen);
        }
        peer.send(data.into())
            .await
            .map_err(|e| Error::SendFailed(e.to_string()))
    }

    /// Anchors a new sink under `container`; it gets the media as soon as there is one
    pub fn register_display(
        &self,
        container: impl Into<Container>,
        surface: Arc<dyn DisplaySurface>,
    ) -> Result<Arc<dyn VideoSink>> {
        if self.state() == NegotiationState::Disposed {
            return Err(Error::Disposed);
        }
        let media = self.media();
        Ok(self.displays.register(
            container.into(),
            surface,
            &self.global_id(),
            self.local,
            media.as_ref(),
        ))
    }

    pub fn displays(&self) -> &DisplayRegistry {
        &self.displays
    }

    /// Releases the peer, capture and speech detection
    pub async fn unpublish(&self) {
        self.release().await;
    }

    /// Like [`Stream::unpublish`], and also detaches every display
    pub async fn dispose(&self) {
        self.release().await;
        self.displays.dispose_all();
    }

    async fn release(&self) {
        {
            let mut state = self.state.lock();
            if *state == NegotiationState::Disposed {
                return;
            }
            *state = NegotiationState::Disposed;
        }

        let peer = self.peer.lock().take();
        match peer {
            Some(peer) => peer.dispose().await,
            None => {
                if let Some(media) = self.media() {
                    media.stop_all();
                }
            }
        }
        if let Some(detector) = self.speech.lock().take() {
            detector.stop();
        }
        self.pending_candidates.lock().clear();
        info!(stream = %self.global_id(), "stream disposed");
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("global_id", &self.global_id())
            .field("local", &self.local)
            .field("state", &self.state())
            .field("displays", &self.displays)
            .finish_non_exhaustive()
    }
}
