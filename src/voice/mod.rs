//! Voice input
//!
//! While listening, a dedicated thread repeatedly asks the recognizer for a
//! phrase and hands any transcript to the caller. Each listening session has
//! its own cancel token, so a quick stop/start never leaves two loops running.

pub mod intent;
mod recognizer;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub use intent::IntentResolver;
pub use recognizer::{CommandRecognizer, SpeechRecognizer};

use crate::speech::Announcer;
use crate::state::SharedStateRef;
use crate::task::{self, CancelToken};

/// Pause between listening attempts
const RELISTEN_DELAY: Duration = Duration::from_millis(100);

/// Voice listening loop controller
pub struct VoiceInput {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    state: SharedStateRef,
    announcer: Announcer,
    session: Mutex<Option<CancelToken>>,
}

impl VoiceInput {
    #[must_use]
    pub fn new(
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        state: SharedStateRef,
        announcer: Announcer,
    ) -> Self {
        Self {
            recognizer,
            state,
            announcer,
            session: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Start listening, handing each transcript to `on_text`
    ///
    /// Returns `true` if a new session started.
    pub fn start<F>(&self, on_text: F) -> bool
    where
        F: Fn(String) + Send + 'static,
    {
        let Some(recognizer) = self.recognizer.clone() else {
            self.announcer.speak("Voice input is not available.");
            return false;
        };

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.is_some() {
            tracing::info!("already listening");
            return false;
        }

        let token = CancelToken::new();
        self.state.set_listening(true);
        self.announcer.speak("Listening for command...");

        let announcer = self.announcer.clone();
        let loop_token = token.clone();
        let spawned = task::spawn_detached("voice-listener", move || {
            listen_loop(recognizer.as_ref(), &announcer, &loop_token, &on_text);
        });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to start voice listener");
            self.state.set_listening(false);
            self.announcer.speak("An error occurred with voice input.");
            return false;
        }

        tracing::info!("voice listening started");
        *session = Some(token);
        true
    }

    /// Stop listening; returns `false` if not listening
    pub fn stop(&self) -> bool {
        let token = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(token) = token else {
            return false;
        };
        token.cancel();
        self.state.set_listening(false);
        tracing::info!("voice listening stopped");
        self.announcer.say_transient("Stopped listening.");
        true
    }

    /// Start if stopped, stop if listening
    pub fn toggle<F>(&self, on_text: F)
    where
        F: Fn(String) + Send + 'static,
    {
        if !self.stop() {
            self.start(on_text);
        }
    }
}

fn listen_loop(
    recognizer: &dyn SpeechRecognizer,
    announcer: &Announcer,
    token: &CancelToken,
    on_text: &dyn Fn(String),
) {
    while !token.is_cancelled() {
        let heard = recognizer.listen();
        if token.is_cancelled() {
            break;
        }
        match heard {
            Ok(Some(text)) => {
                announcer.speak(&format!("Heard: {text}"));
                on_text(text);
            }
            Ok(None) => announcer.speak("Did not hear a clear command."),
            Err(e) => {
                tracing::error!(error = %e, "speech recognition failed");
                announcer.speak("Speech service error. Please check internet connection.");
            }
        }
        if token.wait_timeout(RELISTEN_DELAY) {
            break;
        }
    }
    tracing::debug!("voice listener exited");
}
