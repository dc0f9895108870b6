//! Hark-style voice activity detection
//!
//! [`Hark`] is the pure state machine; [`HarkFactory`] drives one per remote
//! stream by sampling the stream's audio level on a timer.

use crate::media::MediaStream;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Level assumed for streams without a measurable audio track
const SILENCE_DB: f64 = -127.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HarkOptions {
    /// Sampling period in milliseconds
    pub interval_ms: u64,
    /// Number of samples remembered when deciding speech has stopped
    pub history: usize,
}

impl Default for HarkOptions {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            history: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    Speaking,
    StoppedSpeaking,
}

pub type SpeechCallback = Arc<dyn Fn(SpeechEvent) + Send + Sync>;

/// Running detector bound to one media stream
pub trait SpeechDetector: Send + Sync {
    /// Stops sampling; later calls are no-ops
    fn stop(&self);
}

pub trait SpeechDetectorFactory: Send + Sync {
    fn attach(
        &self,
        media: &MediaStream,
        threshold: f64,
        on_event: SpeechCallback,
    ) -> Box<dyn SpeechDetector>;
}

#[derive(Debug, Clone)]
pub struct Hark {
    threshold: f64,
    speaking: bool,
    history: VecDeque<bool>,
}

impl Hark {
    pub fn new(threshold: f64, history: usize) -> Self {
        Self {
            threshold,
            speaking: false,
            history: std::iter::repeat(false).take(history.max(3)).collect(),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Feeds one volume sample (dB) and reports a transition, if any
    pub fn sample(&mut self, volume_db: f64) -> Option<SpeechEvent> {
        let loud = volume_db > self.threshold;
        let mut event = None;

        if loud && !self.speaking {
            // Start quickly: two of the last three samples were loud.
            let recent = self.history.iter().rev().take(3).filter(|&&h| h).count();
            if recent >= 2 {
                self.speaking = true;
                event = Some(SpeechEvent::Speaking);
            }
        } else if !loud && self.speaking && self.history.iter().all(|&h| !h) {
            self.speaking = false;
            event = Some(SpeechEvent::StoppedSpeaking);
        }

        self.history.pop_front();
        self.history.push_back(loud);
        event
    }
}

/// Samples [`MediaStream::audio_level_db`] every `interval_ms`
#[derive(Debug, Clone, Default)]
pub struct HarkFactory {
    options: HarkOptions,
}

impl HarkFactory {
    pub fn new(options: HarkOptions) -> Self {
        Self { options }
    }
}

struct HarkTask {
    handle: Option<JoinHandle<()>>,
}

impl SpeechDetector for HarkTask {
    fn stop(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

impl Drop for HarkTask {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SpeechDetectorFactory for HarkFactory {
    fn attach(
        &self,
        media: &MediaStream,
        threshold: f64,
        on_event: SpeechCallback,
    ) -> Box<dyn SpeechDetector> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(media = %media.id(), "no tokio runtime, speech detection disabled");
                return Box::new(HarkTask { handle: None });
            }
        };

        let media = media.clone();
        let period = Duration::from_millis(self.options.interval_ms.max(1));
        let mut hark = Hark::new(threshold, self.options.history);

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let level = media.audio_level_db().unwrap_or(SILENCE_DB);
                if let Some(event) = hark.sample(level) {
                    trace!(media = %media.id(), ?event, level, "speech transition");
                    on_event(event);
                }
            }
        });

        Box::new(HarkTask {
            handle: Some(handle),
        })
    }
}
