#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use stream_session::capture::{CaptureConstraints, MediaCapture};
use stream_session::hark::SpeechCallback;
use stream_session::{
    CaptureError, Container, DisplaySurface, EngineError, IceCandidate, MediaStream, MediaTrack,
    NegotiationEngine, Participant, PeerHandle, PeerOptions, Role, Room, RoomEvent,
    SignalingClient, SignalingError, SpeechDetector, SpeechDetectorFactory, SpeechEvent, Stream,
    StreamContext, StreamOptions, TrackKind, VideoSink,
};
use tokio::sync::{broadcast, Notify};

pub const OFFER: &str = "v=0 fake-offer";
pub const ANSWER: &str = "v=0 fake-answer";

/// Ordered record of what the fake peer saw
#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<String>>,
    watched: Mutex<Option<broadcast::Receiver<RoomEvent>>>,
}

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Room events seen up to now get journaled before the next peer call
    pub fn watch(&self, rx: broadcast::Receiver<RoomEvent>) {
        *self.watched.lock() = Some(rx);
    }

    fn drain_watched(&self) {
        let mut names = Vec::new();
        if let Some(rx) = self.watched.lock().as_mut() {
            while let Ok(event) = rx.try_recv() {
                names.push(format!("event:{}", event.name()));
            }
        }
        self.entries.lock().extend(names);
    }
}

pub struct FakeSignaling {
    sent: Mutex<Vec<(String, Value)>>,
    reply: Result<Value, SignalingError>,
    gate: Option<Arc<Notify>>,
    pub entered: Arc<Notify>,
}

impl FakeSignaling {
    pub fn answering() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            reply: Ok(json!({ "sdpAnswer": ANSWER })),
            gate: None,
            entered: Arc::new(Notify::new()),
        })
    }

    pub fn failing(err: SignalingError) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            reply: Err(err),
            gate: None,
            entered: Arc::new(Notify::new()),
        })
    }

    /// Holds every response until the returned gate is notified
    pub fn gated() -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let signaling = Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            reply: Ok(json!({ "sdpAnswer": ANSWER })),
            gate: Some(gate.clone()),
            entered: Arc::new(Notify::new()),
        });
        (signaling, gate)
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SignalingClient for FakeSignaling {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, SignalingError> {
        self.sent.lock().push((method.to_string(), params));
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.clone()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineScript {
    pub fail_create: bool,
    pub fail_offer: bool,
    pub reject_answer: bool,
    /// Peers come up without any remote tracks
    pub no_remote_media: bool,
}

pub struct FakeEngine {
    script: EngineScript,
    pub journal: Arc<Journal>,
    pub remote: MediaStream,
    options: Mutex<Vec<PeerOptions>>,
    peers: Mutex<Vec<Arc<FakePeer>>>,
    gate: Option<Arc<Notify>>,
    pub entered: Arc<Notify>,
}

impl FakeEngine {
    pub fn new(script: EngineScript) -> Arc<Self> {
        Arc::new(Self::build(script, None))
    }

    /// Holds every peer construction until the returned gate is notified
    pub fn gated(script: EngineScript) -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (Arc::new(Self::build(script, Some(gate.clone()))), gate)
    }

    fn build(script: EngineScript, gate: Option<Arc<Notify>>) -> Self {
        Self {
            script,
            journal: Arc::new(Journal::default()),
            remote: MediaStream::new(
                "remote",
                vec![
                    MediaTrack::new(TrackKind::Audio),
                    MediaTrack::new(TrackKind::Video),
                ],
            ),
            options: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
            gate,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn options(&self) -> Vec<PeerOptions> {
        self.options.lock().clone()
    }

    pub fn peers(&self) -> Vec<Arc<FakePeer>> {
        self.peers.lock().clone()
    }

    pub fn peer(&self) -> Arc<FakePeer> {
        self.peers.lock().last().cloned().expect("no peer was created")
    }
}

#[async_trait]
impl NegotiationEngine for FakeEngine {
    async fn create_peer(&self, options: PeerOptions) -> Result<Arc<dyn PeerHandle>, EngineError> {
        self.options.lock().push(options.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.script.fail_create {
            return Err(EngineError::Other("cannot build peer".into()));
        }
        let peer = Arc::new(FakePeer {
            role: options.role,
            script: self.script,
            journal: self.journal.clone(),
            remote: self.remote.clone(),
            remote_set: AtomicBool::new(false),
            candidates: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            disposed: AtomicUsize::new(0),
        });
        self.peers.lock().push(peer.clone());
        Ok(peer)
    }
}

pub struct FakePeer {
    role: Role,
    script: EngineScript,
    journal: Arc<Journal>,
    remote: MediaStream,
    remote_set: AtomicBool,
    candidates: Mutex<Vec<IceCandidate>>,
    sent: Mutex<Vec<Bytes>>,
    disposed: AtomicUsize,
}

impl FakePeer {
    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().clone()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerHandle for FakePeer {
    fn role(&self) -> Role {
        self.role
    }

    async fn generate_offer(&self) -> Result<String, EngineError> {
        self.journal.push("generate_offer");
        if self.script.fail_offer {
            return Err(EngineError::Other("no offer".into()));
        }
        Ok(OFFER.to_string())
    }

    async fn set_remote_description(&self, sdp_answer: &str) -> Result<(), EngineError> {
        self.journal.drain_watched();
        self.journal.push(format!("set_remote_description {sdp_answer}"));
        if self.script.reject_answer {
            return Err(EngineError::Other("bad answer".into()));
        }
        self.remote_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remote_media(&self) -> Option<MediaStream> {
        self.journal.push("remote_media");
        let available = self.role.receives()
            && self.remote_set.load(Ordering::SeqCst)
            && !self.script.no_remote_media;
        available.then(|| self.remote.clone())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        self.candidates.lock().push(candidate);
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<(), EngineError> {
        self.sent.lock().push(data);
        Ok(())
    }

    async fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeCapture {
    denied: Option<CaptureError>,
    pub calls: Mutex<Vec<CaptureConstraints>>,
    granted: Mutex<Vec<MediaStream>>,
    gate: Option<Arc<Notify>>,
    pub entered: Arc<Notify>,
}

impl FakeCapture {
    fn build(denied: Option<CaptureError>, gate: Option<Arc<Notify>>) -> Self {
        Self {
            denied,
            calls: Mutex::new(Vec::new()),
            granted: Mutex::new(Vec::new()),
            gate,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn granting() -> Arc<Self> {
        Arc::new(Self::build(None, None))
    }

    pub fn denying(err: CaptureError) -> Arc<Self> {
        Arc::new(Self::build(Some(err), None))
    }

    /// Grants access only once the returned gate is notified
    pub fn gated() -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (Arc::new(Self::build(None, Some(gate.clone()))), gate)
    }

    /// Every media handle handed out so far
    pub fn granted(&self) -> Vec<MediaStream> {
        self.granted.lock().clone()
    }
}

#[async_trait]
impl MediaCapture for FakeCapture {
    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        self.calls.lock().push(constraints.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(err) = &self.denied {
            return Err(err.clone());
        }
        let media = MediaStream::new(
            "capture",
            vec![
                MediaTrack::new(TrackKind::Audio),
                MediaTrack::new(TrackKind::Video),
            ],
        );
        self.granted.lock().push(media.clone());
        Ok(media)
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    callbacks: Mutex<Vec<SpeechCallback>>,
    detectors: Mutex<Vec<Arc<AtomicBool>>>,
    attached_to: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn attached_to(&self) -> Vec<String> {
        self.attached_to.lock().clone()
    }

    /// Fires `event` on the most recently attached detector
    pub fn emit(&self, event: SpeechEvent) {
        let callback = self.callbacks.lock().last().cloned();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    pub fn all_stopped(&self) -> bool {
        self.detectors.lock().iter().all(|d| d.load(Ordering::SeqCst))
    }
}

struct FakeDetector(Arc<AtomicBool>);

impl SpeechDetector for FakeDetector {
    fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl SpeechDetectorFactory for FakeSpeech {
    fn attach(
        &self,
        media: &MediaStream,
        _threshold: f64,
        on_event: SpeechCallback,
    ) -> Box<dyn SpeechDetector> {
        let stopped = Arc::new(AtomicBool::new(false));
        self.callbacks.lock().push(on_event);
        self.detectors.lock().push(stopped.clone());
        self.attached_to.lock().push(media.id().to_string());
        Box::new(FakeDetector(stopped))
    }
}

#[derive(Default)]
pub struct FakeSurface {
    log: Arc<Mutex<Vec<String>>>,
    next: AtomicUsize,
}

impl FakeSurface {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.log.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn binds(&self) -> usize {
        self.count("bind ")
    }

    /// Binds of the media with id `media_id`, over all sinks
    pub fn binds_of(&self, media_id: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|e| e.starts_with("bind ") && e.ends_with(&format!(" {media_id}")))
            .count()
    }

    pub fn detached(&self) -> usize {
        self.count("detach ")
    }
}

struct FakeSink {
    id: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl VideoSink for FakeSink {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn bind(&self, media: &MediaStream, on_playing: Box<dyn FnOnce() + Send>) {
        self.log.lock().push(format!("bind {} {}", self.id, media.id()));
        on_playing();
    }
}

impl DisplaySurface for FakeSurface {
    fn create_sink(&self, muted: bool) -> Arc<dyn VideoSink> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let id = format!("sink{n}");
        self.log.lock().push(format!("create {id} muted={muted}"));
        Arc::new(FakeSink {
            id,
            log: self.log.clone(),
        })
    }

    fn anchor(&self, container: &Container, sink: &Arc<dyn VideoSink>) {
        self.log.lock().push(format!("anchor {} {:?}", sink.id(), container));
    }

    fn show_loading(&self, key: &str) {
        self.log.lock().push(format!("show {key}"));
    }

    fn hide_loading(&self, key: &str) {
        self.log.lock().push(format!("hide {key}"));
    }

    fn detach(&self, _container: &Container, sink: &Arc<dyn VideoSink>) {
        self.log.lock().push(format!("detach {}", sink.id()));
    }
}

pub struct FakeParticipant {
    id: Mutex<String>,
    relayed: Mutex<Vec<(String, IceCandidate)>>,
}

impl FakeParticipant {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: Mutex::new(id.to_string()),
            relayed: Mutex::new(Vec::new()),
        })
    }

    pub fn rename(&self, id: &str) {
        *self.id.lock() = id.to_string();
    }

    pub fn relayed(&self) -> Vec<(String, IceCandidate)> {
        self.relayed.lock().clone()
    }
}

impl Participant for FakeParticipant {
    fn id(&self) -> String {
        self.id.lock().clone()
    }

    fn send_ice_candidate(&self, endpoint: &str, candidate: IceCandidate) {
        self.relayed.lock().push((endpoint.to_string(), candidate));
    }
}

pub fn candidate(n: u32) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 UDP 2122252543 10.0.0.{n} 5000 typ host"),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
        connection_id: "fake".into(),
    }
}

pub struct Harness {
    pub signaling: Arc<FakeSignaling>,
    pub engine: Arc<FakeEngine>,
    pub capture: Arc<FakeCapture>,
    pub speech: Arc<FakeSpeech>,
    pub room: Arc<Room>,
    pub surface: Arc<FakeSurface>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeSignaling::answering(), EngineScript::default())
    }

    pub fn with(signaling: Arc<FakeSignaling>, script: EngineScript) -> Self {
        Self {
            signaling,
            engine: FakeEngine::new(script),
            capture: FakeCapture::granting(),
            speech: Arc::new(FakeSpeech::default()),
            room: Arc::new(Room::default()),
            surface: Arc::new(FakeSurface::default()),
        }
    }

    pub fn context(&self) -> StreamContext {
        StreamContext {
            signaling: self.signaling.clone(),
            engine: self.engine.clone(),
            capture: self.capture.clone(),
            speech: self.speech.clone(),
            room: self.room.clone(),
            constraints: CaptureConstraints::default(),
        }
    }

    pub fn stream(&self, local: bool, participant: &Arc<FakeParticipant>, data: bool) -> Arc<Stream> {
        Stream::new(
            self.context(),
            local,
            StreamOptions {
                participant: Some(participant.clone() as Arc<dyn Participant>),
                data,
                ..Default::default()
            },
        )
    }

    pub fn display(&self, stream: &Stream, container: &str) {
        stream
            .register_display(container, self.surface.clone())
            .unwrap();
    }

    /// Room events emitted so far
    pub fn drain(rx: &mut broadcast::Receiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}
