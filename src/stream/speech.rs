use super::Stream;
use crate::events::RoomEvent;
use crate::hark::{SpeechDetector, SpeechEvent};
use crate::media::MediaStream;
use crate::room::Room;
use std::sync::Arc;
use tracing::debug;

/// Attaches a detector to `media` that reports through the stream's room
pub(super) fn attach(stream: &Arc<Stream>, media: &MediaStream) -> Box<dyn SpeechDetector> {
    let weak = Arc::downgrade(stream);
    let room = stream.ctx.room.clone();
    let threshold = room.threshold_speaker();

    stream.ctx.speech.attach(
        media,
        threshold,
        Arc::new(move |event| {
            // global id is looked up per event, the participant may have been renamed
            if let Some(stream) = weak.upgrade() {
                relay(&room, &stream.global_id(), event);
            }
        }),
    )
}

pub(crate) fn relay(room: &Room, participant_id: &str, event: SpeechEvent) {
    debug!(participant = %participant_id, ?event, "speech activity");
    match event {
        SpeechEvent::Speaking => {
            room.add_participant_speaking(participant_id);
            room.emit(RoomEvent::StreamSpeaking {
                participant_id: participant_id.to_string(),
            });
        }
        SpeechEvent::StoppedSpeaking => {
            room.remove_participant_speaking(participant_id);
            room.emit(RoomEvent::StreamStoppedSpeaking {
                participant_id: participant_id.to_string(),
            });
        }
    }
}
