//! Local media capture
//!
//! [`MediaCapture`] is the platform capability a local stream asks for camera
//! and microphone access. [`SampleCapture`] is the webrtc-rs flavour: it hands
//! back sample tracks that the application feeds with already-encoded frames.

use crate::error::CaptureError;
use crate::media::{MediaStream, MediaTrack, TrackKind};
use crate::utils::random_id;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoConstraints {
    pub enabled: bool,
    pub ideal_width: u32,
    pub ideal_frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            enabled: true,
            ideal_width: 1280,
            ideal_frame_rate: 15,
        }
    }
}

/// What a local stream asks the platform for
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConstraints {
    pub audio: bool,
    pub video: VideoConstraints,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: VideoConstraints::default(),
        }
    }
}

#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError>;
}

/// Capture backed by webrtc sample tracks (Opus audio, VP8 video)
#[derive(Debug, Default)]
pub struct SampleCapture;

impl SampleCapture {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaCapture for SampleCapture {
    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if !constraints.audio && !constraints.video.enabled {
            return Err(CaptureError::NothingRequested);
        }

        let stream_id = format!("capture-{}", random_id());
        let mut tracks = Vec::new();

        if constraints.audio {
            let track = TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                format!("audio-{}", random_id()),
                stream_id.clone(),
            );
            tracks.push(MediaTrack::local(TrackKind::Audio, Arc::new(track)));
        }

        if constraints.video.enabled {
            let track = TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                format!("video-{}", random_id()),
                stream_id.clone(),
            );
            tracks.push(MediaTrack::local(TrackKind::Video, Arc::new(track)));
        }

        debug!(
            stream_id = %stream_id,
            tracks = tracks.len(),
            ideal_width = constraints.video.ideal_width,
            ideal_frame_rate = constraints.video.ideal_frame_rate,
            "sample capture ready"
        );
        Ok(MediaStream::new(stream_id, tracks))
    }
}
