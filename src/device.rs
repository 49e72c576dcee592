//! Device - the controller core
//!
//! Wires hardware, speech, gesture classification, the proximity monitor and
//! the dispatcher together, exposes the host-facing operations, and tears
//! everything down in order at shutdown.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::JoinHandle;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::dispatch::{Collaborators, CommandAck, CommandArgs, CommandDispatcher, GestureMap};
use crate::events::{Event, EventBus};
use crate::hardware::{ButtonPoller, Hardware};
use crate::input::keyboard::{self, KeyAction};
use crate::input::{self, ButtonId, EdgeEvent, EdgeSender, GestureClassifier, GestureSink, Level};
use crate::proximity::ProximityMonitor;
use crate::services::Services;
use crate::speech::{Announcer, LogRenderer, SpeechQueue, SpeechRenderer, renderer};
use crate::state::{ClientLocation, SharedState, SharedStateRef};
use crate::task::{self, CancelToken};
use crate::voice::{IntentResolver, VoiceInput};
use crate::{Config, Result};

/// Snapshot reported by the status endpoint
#[derive(Debug, Clone, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct DeviceStatus {
    pub version: &'static str,
    pub navigation_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_target: Option<String>,
    pub listening: bool,
    pub led_on: bool,
    pub distance_available: bool,
    pub voice_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response: Option<String>,
}

/// The running controller
pub struct Device {
    config: Config,
    events: EventBus,
    state: SharedStateRef,
    hardware: Hardware,
    announcer: Announcer,
    dispatcher: CommandDispatcher,
    classifier: Arc<GestureClassifier>,
    edges: Mutex<Option<EdgeSender>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    loop_token: CancelToken,
    quit: CancelToken,
    stopped: AtomicBool,
}

impl Device {
    /// Build every collaborator from configuration and start the device
    ///
    /// Must be called outside of an async context.
    ///
    /// # Errors
    ///
    /// Returns error if the speech queue cannot be started
    pub fn from_config(config: Config) -> Result<Arc<Self>> {
        let hardware = Hardware::from_config(&config);
        let services = Services::from_config(&config);
        let renderer = renderer::select(&config.speech).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "speech engine unavailable, logging utterances instead");
            Arc::new(LogRenderer) as Arc<dyn SpeechRenderer>
        });
        let buttons = if config.features.buttons {
            Hardware::button_pins(&config)
        } else {
            Vec::new()
        };

        let device = Self::start(config, hardware, services, renderer)?;
        if !buttons.is_empty() {
            device.attach_buttons(buttons);
        }
        Ok(device)
    }

    /// Start the device with explicit collaborators
    ///
    /// # Errors
    ///
    /// Returns error if the speech queue cannot be started
    pub fn start(
        config: Config,
        hardware: Hardware,
        services: Services,
        renderer: Arc<dyn SpeechRenderer>,
    ) -> Result<Arc<Self>> {
        let events = EventBus::new();
        let state = SharedState::new_shared();

        let queue = Arc::new(SpeechQueue::start(renderer, config.speech.shutdown_timeout)?);
        let announcer = Announcer::new(queue, state.clone(), events.clone());

        let voice = VoiceInput::new(services.recognizer.clone(), state.clone(), announcer.clone());
        let dispatcher = CommandDispatcher::new(Collaborators {
            announcer: announcer.clone(),
            events: events.clone(),
            state: state.clone(),
            hardware: hardware.clone(),
            vision: services.vision(),
            locator: services.locator(state.clone(), config.features.location),
            weather: services.weather.clone(),
            text: services.text.clone(),
            voice,
            intents: IntentResolver::new(services.text.clone()),
            gestures: GestureMap::default(),
            navigation: config.navigation,
            obstacle_cm: config.proximity.warning_cm,
        });

        let sink: GestureSink = {
            let dispatcher = dispatcher.clone();
            Arc::new(move |gesture| dispatcher.dispatch_gesture(gesture))
        };
        let classifier = GestureClassifier::new(&config.gestures, sink);

        let (edges, rx) = input::edge_channel(config.gestures.edge_queue_capacity);
        let mut loops = Vec::new();
        match input::spawn_edge_consumer(rx, Arc::clone(&classifier)) {
            Ok(handle) => loops.push(handle),
            Err(e) => tracing::error!(error = %e, "edge consumer unavailable, gestures disabled"),
        }

        let loop_token = CancelToken::new();
        let proximity = &config.proximity;
        if config.features.distance && proximity.enabled && hardware.distance.is_available() {
            let monitor = ProximityMonitor::new(
                hardware.distance.clone(),
                hardware.buzzer.clone(),
                events.clone(),
                proximity,
            );
            match monitor.spawn(loop_token.clone()) {
                Ok(handle) => loops.push(handle),
                Err(e) => tracing::error!(error = %e, "proximity monitor unavailable"),
            }
        } else {
            tracing::info!("proximity monitoring disabled");
        }

        tracing::info!(?hardware, "device started");

        Ok(Arc::new(Self {
            config,
            events,
            state,
            hardware,
            announcer,
            dispatcher,
            classifier,
            edges: Mutex::new(Some(edges)),
            loops: Mutex::new(loops),
            loop_token,
            quit: CancelToken::new(),
            stopped: AtomicBool::new(false),
        }))
    }

    /// Poll physical buttons into the edge channel
    pub fn attach_buttons<P>(&self, pins: Vec<(ButtonId, P)>)
    where
        P: crate::hardware::InputPin + 'static,
    {
        let Some(edges) = self.edge_sender() else {
            return;
        };
        let count = pins.len();
        let poller = ButtonPoller::new(pins, self.config.gestures.debounce, edges);
        match poller.spawn(self.loop_token.clone()) {
            Ok(handle) => {
                tracing::info!(buttons = count, "button polling started");
                self.lock_loops().push(handle);
            }
            Err(e) => tracing::error!(error = %e, "button poller unavailable"),
        }
    }

    /// Read desktop shortcuts from `reader`; `q` requests shutdown
    pub fn attach_keyboard<R>(self: &Arc<Self>, reader: R)
    where
        R: BufRead + Send + 'static,
    {
        let device: Weak<Self> = Arc::downgrade(self);
        let spawned = keyboard::spawn_keyboard(reader, move |action| {
            let Some(device) = device.upgrade() else {
                return;
            };
            match action {
                KeyAction::Command(command) => {
                    device.dispatcher.dispatch(command, CommandArgs::default());
                }
                KeyAction::Quit => device.request_shutdown(),
            }
        });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "keyboard shortcuts unavailable");
        }
    }

    /// Feed one raw button edge, stamped now
    pub fn on_edge(&self, button: ButtonId, level: Level) -> bool {
        self.edge_sender()
            .is_some_and(|edges| edges.send(EdgeEvent::now(button, level)))
    }

    /// Route recognized speech
    pub fn on_voice_text(&self, text: &str) {
        self.dispatcher.on_voice_text(text);
    }

    /// Dispatch a named command
    pub fn dispatch(&self, name: &str, args: CommandArgs) -> CommandAck {
        self.dispatcher.dispatch_named(name, args)
    }

    /// Speak text, remembering it for repeat
    pub fn speak(&self, text: &str) {
        self.announcer.speak(text);
    }

    /// Abort the current utterance
    pub fn stop_speaking(&self) {
        self.announcer.stop();
    }

    /// One fresh distance reading in cm, or `-1.0` when invalid
    #[must_use]
    pub fn get_distance(&self) -> f64 {
        self.hardware.distance.read().as_sentinel()
    }

    /// Record coordinates pushed by the remote client
    pub fn set_client_location(&self, latitude: f64, longitude: f64) {
        self.state.set_client_location(ClientLocation {
            latitude,
            longitude,
        });
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn state(&self) -> &SharedStateRef {
        &self.state
    }

    #[must_use]
    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether `button` is currently held down
    #[must_use]
    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.classifier.is_pressed(button)
    }

    #[must_use]
    pub fn status(&self) -> DeviceStatus {
        let navigation = self.dispatcher.navigation();
        DeviceStatus {
            version: env!("CARGO_PKG_VERSION"),
            navigation_active: navigation.is_active(),
            navigation_target: navigation.target(),
            listening: self.state.listening(),
            led_on: self.hardware.led.is_on(),
            distance_available: self.hardware.distance.is_available(),
            voice_available: self.dispatcher.voice().is_available(),
            last_response: self.state.last_response(),
        }
    }

    /// Ask the host to shut down (keyboard `q`)
    pub fn request_shutdown(&self) {
        tracing::info!("shutdown requested");
        self.quit.cancel();
    }

    /// Token cancelled once a shutdown has been requested
    #[must_use]
    pub fn shutdown_requested(&self) -> CancelToken {
        self.quit.clone()
    }

    /// Stop every loop and release the outputs; later calls do nothing
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutting down");
        let grace = self.config.speech.shutdown_timeout;

        self.dispatcher.navigation().shutdown(grace);

        self.loop_token.cancel();
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let loops = std::mem::take(&mut *self.lock_loops());
        for handle in loops {
            task::join_with_timeout(handle, grace);
        }

        self.dispatcher.voice().stop();

        if !self.announcer.queue().shutdown() {
            tracing::warn!("speech queue did not drain in time");
        }

        self.hardware.reset_outputs();
        self.quit.cancel();
        tracing::info!("shutdown complete");
    }

    fn edge_sender(&self) -> Option<EdgeSender> {
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_loops(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.loops.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown();
    }
}
