//! Display registry
//!
//! Rendering is supplied by the host through [`DisplaySurface`]; the registry
//! only remembers which sinks exist and makes sure each of them is bound to
//! every media handle the stream produces exactly once.

use crate::media::MediaStream;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Opaque handle of a host-side container element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Where a sink gets anchored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// Looked up by identifier
    Id(String),
    /// Passed directly
    Handle(SurfaceHandle),
}

impl From<&str> for Container {
    fn from(id: &str) -> Self {
        Container::Id(id.to_string())
    }
}

impl From<SurfaceHandle> for Container {
    fn from(handle: SurfaceHandle) -> Self {
        Container::Handle(handle)
    }
}

/// A video element (or equivalent) able to play a media stream
pub trait VideoSink: Send + Sync {
    fn id(&self) -> String;

    /// Starts playing `media`. `on_playing` is called on first successful playback.
    fn bind(&self, media: &MediaStream, on_playing: Box<dyn FnOnce() + Send>);
}

/// Host rendering capability
pub trait DisplaySurface: Send + Sync {
    /// Local previews are created muted
    fn create_sink(&self, muted: bool) -> Arc<dyn VideoSink>;

    fn anchor(&self, container: &Container, sink: &Arc<dyn VideoSink>);

    fn show_loading(&self, key: &str);

    fn hide_loading(&self, key: &str);

    /// Removes the sink and its container from the document
    fn detach(&self, container: &Container, sink: &Arc<dyn VideoSink>);
}

struct Binding {
    container: Container,
    sink: Arc<dyn VideoSink>,
    surface: Arc<dyn DisplaySurface>,
    loading_key: String,
    bound: Option<MediaStream>,
}

impl Binding {
    fn needs(&self, media: &MediaStream) -> bool {
        !self.bound.as_ref().is_some_and(|bound| bound.same_as(media))
    }
}

struct Delivery {
    sink: Arc<dyn VideoSink>,
    surface: Arc<dyn DisplaySurface>,
    loading_key: String,
}

impl Delivery {
    fn run(self, media: &MediaStream) {
        let surface = self.surface.clone();
        let key = self.loading_key.clone();
        debug!(sink = %self.sink.id(), media = %media.id(), "binding media to sink");
        self.sink
            .bind(media, Box::new(move || surface.hide_loading(&key)));
    }
}

#[derive(Default)]
pub struct DisplayRegistry {
    bindings: Mutex<Vec<Binding>>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and anchors a sink, binding `media` right away when it is known
    pub fn register(
        &self,
        container: Container,
        surface: Arc<dyn DisplaySurface>,
        loading_key: &str,
        muted: bool,
        media: Option<&MediaStream>,
    ) -> Arc<dyn VideoSink> {
        let sink = surface.create_sink(muted);
        surface.anchor(&container, &sink);
        surface.show_loading(loading_key);

        self.bindings.lock().push(Binding {
            container,
            sink: sink.clone(),
            surface: surface.clone(),
            loading_key: loading_key.to_string(),
            bound: media.cloned(),
        });

        if let Some(media) = media {
            Delivery {
                sink: sink.clone(),
                surface: surface.clone(),
                loading_key: loading_key.to_string(),
            }
            .run(media);
            surface.hide_loading(loading_key);
        }
        sink
    }

    /// Binds `media` to every sink that has not received it yet
    pub fn fan_out(&self, media: &MediaStream) -> usize {
        let deliveries: Vec<Delivery> = self
            .bindings
            .lock()
            .iter_mut()
            .filter(|b| b.needs(media))
            .map(|b| {
                b.bound = Some(media.clone());
                Delivery {
                    sink: b.sink.clone(),
                    surface: b.surface.clone(),
                    loading_key: b.loading_key.clone(),
                }
            })
            .collect();

        let count = deliveries.len();
        for delivery in deliveries {
            delivery.run(media);
        }
        count
    }

    /// Detaches every sink and clears the registry
    pub fn dispose_all(&self) {
        let bindings = std::mem::take(&mut *self.bindings.lock());
        for binding in bindings {
            binding.surface.hide_loading(&binding.loading_key);
            binding.surface.detach(&binding.container, &binding.sink);
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DisplayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayRegistry")
            .field("bindings", &self.len())
            .finish()
    }
}
