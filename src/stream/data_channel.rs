use crate::peer::DataChannelConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Open flag and label counter of a stream's data channel
#[derive(Debug, Default)]
pub struct DataChannelState {
    counter: AtomicU64,
    opened: Arc<AtomicBool>,
}

impl DataChannelState {
    /// `<global id>_<n>`; `n` grows on every call
    pub fn next_name(&self, global_id: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{global_id}_{n}")
    }

    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// Channel config whose callbacks drive the open flag
    pub fn config(&self, label: String) -> DataChannelConfig {
        let on_open = self.opened.clone();
        let on_close = self.opened.clone();
        DataChannelConfig {
            label,
            on_open: Arc::new(move || on_open.store(true, Ordering::SeqCst)),
            on_close: Arc::new(move || on_close.store(false, Ordering::SeqCst)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_never_repeat() {
        let state = DataChannelState::default();
        assert_eq!(state.next_name("p_webcam"), "p_webcam_0");
        assert_eq!(state.next_name("p_webcam"), "p_webcam_1");
        assert_ne!(state.next_name("p_webcam"), state.next_name("p_webcam"));
    }

    #[test]
    fn flag_follows_latest_notification() {
        let state = DataChannelState::default();
        let config = state.config("label".into());
        assert!(!state.is_opened());
        (config.on_open)();
        assert!(state.is_opened());
        (config.on_close)();
        assert!(!state.is_opened());
        (config.on_open)();
        assert!(state.is_opened());
    }
}
