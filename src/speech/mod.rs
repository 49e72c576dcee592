//! Speech output
//!
//! A single consumer thread owns the audio channel and plays requests one at
//! a time in FIFO order. [`SpeechQueue::stop`] aborts only the utterance in
//! progress; anything queued behind it still plays.

mod announcer;
pub mod renderer;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub use announcer::Announcer;
pub use renderer::{LogRenderer, ProcessRenderer, SpeechRenderer};

use crate::Result;
use crate::task;

/// One queued utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub enqueued_at: Instant,
}

#[derive(Debug)]
enum QueueItem {
    Speak(SpeechRequest),
    Shutdown,
}

/// Serialized access to the speech renderer
pub struct SpeechQueue {
    tx: Sender<QueueItem>,
    renderer: Arc<dyn SpeechRenderer>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl SpeechQueue {
    /// Start the consumer thread
    ///
    /// # Errors
    ///
    /// Returns error if the consumer thread cannot be spawned
    pub fn start(renderer: Arc<dyn SpeechRenderer>, shutdown_timeout: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let consumer = {
            let renderer = Arc::clone(&renderer);
            task::spawn_loop("speech", move || run_consumer(&rx, renderer.as_ref()))?
        };
        tracing::info!(renderer = renderer.name(), "speech queue started");

        Ok(Self {
            tx,
            renderer,
            consumer: Mutex::new(Some(consumer)),
            shutdown_timeout,
        })
    }

    /// Queue text for playback without blocking
    ///
    /// Returns `false` for empty text or after shutdown.
    pub fn enqueue(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            tracing::warn!("attempted to speak empty text");
            return false;
        }
        tracing::info!(text = %preview(text), "queuing speech");
        let request = SpeechRequest {
            text: text.to_string(),
            enqueued_at: Instant::now(),
        };
        if self.tx.send(QueueItem::Speak(request)).is_err() {
            tracing::warn!("speech queue closed, dropping utterance");
            return false;
        }
        true
    }

    /// Abort the utterance in progress; queued items are kept
    pub fn stop(&self) {
        tracing::info!("stopping current speech");
        self.renderer.abort();
    }

    /// Drain the queue and stop the consumer, waiting at most the configured timeout
    ///
    /// Returns `true` if the consumer exited in time. Calling it twice is harmless.
    pub fn shutdown(&self) -> bool {
        let Some(handle) = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return true;
        };
        tracing::info!("shutting down speech queue");
        let _ = self.tx.send(QueueItem::Shutdown);
        task::join_with_timeout(handle, self.shutdown_timeout)
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        let _ = self.tx.send(QueueItem::Shutdown);
    }
}

fn run_consumer(rx: &Receiver<QueueItem>, renderer: &dyn SpeechRenderer) {
    while let Ok(item) = rx.recv() {
        let request = match item {
            QueueItem::Speak(request) => request,
            QueueItem::Shutdown => break,
        };
        tracing::debug!(
            waited_ms = request.enqueued_at.elapsed().as_millis(),
            text = %preview(&request.text),
            "speaking"
        );
        if let Err(e) = renderer.render(&request.text) {
            tracing::error!(error = %e, "speech rendering failed");
        }
    }
    tracing::info!("speech consumer stopped");
}

/// First 50 characters, for logs
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(50).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
