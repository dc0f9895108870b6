//! Media stream and track handles
//!
//! A [`MediaStream`] is shared read-only between the owning stream session and
//! every display binding, so it is a cheap `Arc` clone.

use crate::utils::random_id;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Audio level reported for silence (RFC 6464 range is 0..=127 -dBov)
pub const SILENT_LEVEL: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    stopped: AtomicBool,
    level: AtomicU8,
    local: Option<Arc<TrackLocalStaticSample>>,
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stopped", &self.is_stopped())
            .field("local", &self.local.is_some())
            .finish()
    }
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Self::with_id(random_id(), kind)
    }

    pub fn with_id(id: impl Into<String>, kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind,
            stopped: AtomicBool::new(false),
            level: AtomicU8::new(SILENT_LEVEL),
            local: None,
        })
    }

    /// Track backed by a webrtc sample track that the application writes into
    pub fn local(kind: TrackKind, track: Arc<TrackLocalStaticSample>) -> Arc<Self> {
        Arc::new(Self {
            id: track.id().to_string(),
            kind,
            stopped: AtomicBool::new(false),
            level: AtomicU8::new(SILENT_LEVEL),
            local: Some(track),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn local_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.local.as_ref()
    }

    /// Stops the track. Repeated calls are no-ops.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Records the latest level in -dBov, clamped to the RFC 6464 range
    pub fn set_audio_level(&self, level: u8) {
        self.level.store(level.min(SILENT_LEVEL), Ordering::Relaxed);
    }

    pub fn audio_level_db(&self) -> f64 {
        -f64::from(self.level.load(Ordering::Relaxed))
    }

    /// Writes an encoded sample; ignored once the track is stopped
    pub async fn write_sample(&self, sample: &Sample) -> Result<(), webrtc::Error> {
        if self.is_stopped() {
            return Ok(());
        }
        match &self.local {
            Some(track) => track.write_sample(sample).await,
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaStream {
    inner: Arc<StreamTracks>,
}

#[derive(Debug)]
struct StreamTracks {
    id: String,
    tracks: RwLock<Vec<Arc<MediaTrack>>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self {
            inner: Arc::new(StreamTracks {
                id: id.into(),
                tracks: RwLock::new(tracks),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.inner.tracks.read().clone()
    }

    /// Remote streams grow as the peer reports incoming tracks
    pub fn add_track(&self, track: Arc<MediaTrack>) {
        self.inner.tracks.write().push(track);
    }

    pub fn audio_tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.kind(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.kind(TrackKind::Video)
    }

    fn kind(&self, kind: TrackKind) -> Vec<Arc<MediaTrack>> {
        self.inner
            .tracks
            .read()
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn stop_all(&self) {
        for track in self.inner.tracks.read().iter() {
            track.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.tracks.read().iter().all(|t| t.is_stopped())
    }

    /// Loudest live audio track, `None` when there is no audio to measure
    pub fn audio_level_db(&self) -> Option<f64> {
        self.inner
            .tracks
            .read()
            .iter()
            .filter(|t| t.kind() == TrackKind::Audio && !t.is_stopped())
            .map(|t| t.audio_level_db())
            .reduce(f64::max)
    }

    pub fn same_as(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
