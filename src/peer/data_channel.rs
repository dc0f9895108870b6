use crate::peer::types::DataChannelConfig;
use std::sync::Arc;
use tracing::{debug, trace};
use webrtc::data_channel::RTCDataChannel;

/// Wires the channel's lifecycle notifications to the stream's callbacks
pub fn attach_dc(dc: &Arc<RTCDataChannel>, config: &DataChannelConfig) {
    debug!(label = %dc.label(), "attaching data channel handlers");

    dc.on_open(Box::new({
        let label = config.label.clone();
        let on_open = config.on_open.clone();
        move || {
            debug!(label = %label, "data channel is opened");
            on_open();
            Box::pin(async {})
        }
    }));

    dc.on_close(Box::new({
        let label = config.label.clone();
        let on_close = config.on_close.clone();
        move || {
            debug!(label = %label, "data channel is closed");
            on_close();
            Box::pin(async {})
        }
    }));

    dc.on_message(Box::new({
        let label = config.label.clone();
        move |msg| {
            trace!(label = %label, len = msg.data.len(), is_string = msg.is_string, "data channel message");
            Box::pin(async {})
        }
    }));
}
