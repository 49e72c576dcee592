use std::sync::Arc;

use super::SpeechQueue;
use crate::events::{EventBus, EventKind};
use crate::state::SharedStateRef;

/// The single entry point for speaking to the user
///
/// Keeps `LastResponse` in step with what is queued and mirrors every
/// utterance onto the event bus.
#[derive(Clone)]
pub struct Announcer {
    queue: Arc<SpeechQueue>,
    state: SharedStateRef,
    events: EventBus,
}

impl Announcer {
    #[must_use]
    pub const fn new(queue: Arc<SpeechQueue>, state: SharedStateRef, events: EventBus) -> Self {
        Self {
            queue,
            state,
            events,
        }
    }

    /// Speak `text` and remember it for `repeat_last`
    pub fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            tracing::warn!("attempted to speak empty text");
            return;
        }
        self.state.set_last_response(text);
        self.say_transient(text);
    }

    /// Speak `text` without touching the last response
    pub fn say_transient(&self, text: &str) {
        if self.queue.enqueue(text) {
            self.events.publish(EventKind::SpeechOutput {
                message: text.to_string(),
            });
        }
    }

    /// Abort the utterance in progress
    pub fn stop(&self) {
        self.queue.stop();
        self.events.publish(EventKind::StopSpeech);
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<SpeechQueue> {
        &self.queue
    }
}
