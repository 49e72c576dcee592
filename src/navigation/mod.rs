//! Navigation guidance session
//!
//! At most one session is active. Starting spawns a guidance loop that ticks
//! every period: an obstacle check, the next instruction of a fixed route,
//! and a path-focused scene description. Stopping cancels the session token;
//! the loop checks it before every blocking step and wakes from its sleep
//! immediately, so a stop takes effect within one tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::NavigationConfig;
use crate::events::{EventBus, EventKind, InstructionKind, NavigationPhase};
use crate::hardware::{Buzzer, DistanceSensor};
use crate::proximity::format_cm;
use crate::services::Locator;
use crate::speech::Announcer;
use crate::state::SharedStateRef;
use crate::task::{self, CancelToken};

/// Route spoken one step per tick
pub const INSTRUCTIONS: [&str; 5] = [
    "Continue straight for fifty meters.",
    "You are approaching an intersection. Be cautious.",
    "After the intersection, turn left.",
    "Walk along the sidewalk for another hundred meters.",
    "You have arrived at your approximate destination.",
];

/// Prompt suffix for the per-tick scene description
pub const SCENE_SUFFIX: &str =
    "Focus on path conditions, potential hazards like curbs or stairs, and upcoming turns.";

/// Buzzer pulse for an obstacle found during a tick
pub const OBSTACLE_PULSE: Duration = Duration::from_millis(150);

/// Requests a spoken scene description with an extra prompt suffix
pub type SceneDescriber = Arc<dyn Fn(&str) + Send + Sync>;

/// Collaborators of a navigation session
#[derive(Clone)]
pub struct NavigationDeps {
    pub announcer: Announcer,
    pub events: EventBus,
    pub state: SharedStateRef,
    pub sensor: Arc<dyn DistanceSensor>,
    pub buzzer: Arc<dyn Buzzer>,
    pub locator: Locator,
    pub describe_scene: SceneDescriber,
    /// Obstacles closer than this raise an alert
    pub obstacle_cm: f64,
}

#[derive(Default)]
struct Session {
    target: Option<String>,
    token: Option<CancelToken>,
    tick_index: usize,
    worker: Option<JoinHandle<()>>,
}

/// The navigation state machine (Idle / Active)
pub struct NavigationSession {
    deps: NavigationDeps,
    config: NavigationConfig,
    session: Mutex<Session>,
}

impl NavigationSession {
    #[must_use]
    pub fn new(deps: NavigationDeps, config: NavigationConfig) -> Arc<Self> {
        Arc::new(Self {
            deps,
            config,
            session: Mutex::new(Session::default()),
        })
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deps.state.navigation_active()
    }

    /// Destination of the active session
    #[must_use]
    pub fn target(&self) -> Option<String> {
        self.lock().target.clone()
    }

    /// Instructions given so far in the active session
    #[must_use]
    pub fn tick_index(&self) -> usize {
        self.lock().tick_index
    }

    /// Start guidance to `target`; a no-op with a spoken notice when active
    pub fn start(self: &Arc<Self>, target: &str) -> bool {
        let mut session = self.lock();
        if !self.deps.state.try_activate_navigation() {
            self.deps.announcer.speak("Navigation is already active.");
            return false;
        }

        let message = format!("Starting navigation to {target}. I will guide you.");
        self.deps.announcer.speak(&message);

        let token = CancelToken::new();
        let this = Arc::clone(self);
        let loop_token = token.clone();
        let worker = match task::spawn_loop("navigation", move || this.run(&loop_token)) {
            Ok(worker) => worker,
            Err(e) => {
                tracing::error!(error = %e, "failed to start navigation loop");
                self.deps.state.set_navigation_active(false);
                self.deps.announcer.speak("Sorry, I couldn't start navigation.");
                return false;
            }
        };

        tracing::info!(destination = %target, "navigation started");
        *session = Session {
            target: Some(target.to_string()),
            token: Some(token),
            tick_index: 0,
            worker: Some(worker),
        };
        drop(session);

        self.deps.events.publish(EventKind::NavigationStatus {
            status: NavigationPhase::Started,
            destination: Some(target.to_string()),
            message,
        });
        true
    }

    /// Stop guidance; a no-op with a spoken notice when idle
    pub fn stop(&self) -> bool {
        let mut session = self.lock();
        if !self.deps.state.navigation_active() {
            drop(session);
            self.deps.announcer.speak("Navigation is not currently active.");
            return false;
        }
        self.end(&mut session);
        drop(session);
        self.announce_stopped();
        true
    }

    /// Stop if active, start towards `target` if idle
    pub fn toggle(self: &Arc<Self>, target: &str) {
        if self.is_active() {
            self.stop();
        } else {
            self.start(target);
        }
    }

    /// Cancel any session silently and wait up to `grace` for its loop
    pub fn shutdown(&self, grace: Duration) {
        let worker = {
            let mut session = self.lock();
            if self.deps.state.navigation_active() {
                self.end(&mut session);
            }
            session.worker.take()
        };
        if let Some(worker) = worker {
            task::join_with_timeout(worker, grace);
        }
    }

    fn end(&self, session: &mut Session) {
        if let Some(token) = session.token.take() {
            token.cancel();
        }
        session.target = None;
        session.tick_index = 0;
        self.deps.state.set_navigation_active(false);
        tracing::info!("navigation stopped");
    }

    fn announce_stopped(&self) {
        let message = "Stopping navigation. You are now free to roam.".to_string();
        self.deps.announcer.speak(&message);
        self.deps.events.publish(EventKind::NavigationStatus {
            status: NavigationPhase::Stopped,
            destination: None,
            message,
        });
    }

    /// Stop only if `token` still identifies the active session
    fn finish(&self, token: &CancelToken) {
        let mut session = self.lock();
        if !Self::owns(&session, token) {
            return;
        }
        self.end(&mut session);
        drop(session);
        self.announce_stopped();
    }

    fn run(&self, token: &CancelToken) {
        let mut index = 0;
        while !token.is_cancelled() {
            self.check_obstacle();
            if token.is_cancelled() {
                break;
            }

            let located = self.deps.locator.current_location().is_some();
            if token.is_cancelled() {
                break;
            }

            if located && index < INSTRUCTIONS.len() {
                if !self.advance(token, index) {
                    break;
                }
                index += 1;

                if index == INSTRUCTIONS.len() {
                    if !token.wait_timeout(self.config.grace) {
                        self.finish(token);
                    }
                    break;
                }
            } else {
                self.deps
                    .announcer
                    .speak("Continuing on current path. No specific instruction at this moment.");
                self.publish_instruction("Continuing on current path.", InstructionKind::Status);
            }

            if token.is_cancelled() {
                break;
            }
            (self.deps.describe_scene)(SCENE_SUFFIX);

            if token.wait_timeout(self.config.period) {
                break;
            }
        }
        tracing::debug!("navigation loop exited");
    }

    /// Give instruction `index` if `token` is still the active session
    ///
    /// Holds the session lock throughout, so a concurrent stop and restart
    /// either happens first and silences this tick, or waits for it.
    fn advance(&self, token: &CancelToken, index: usize) -> bool {
        let mut session = self.lock();
        if !Self::owns(&session, token) {
            return false;
        }
        let instruction = INSTRUCTIONS[index];
        session.tick_index = index + 1;
        self.deps.announcer.speak(instruction);
        self.publish_instruction(instruction, InstructionKind::Guidance);
        tracing::info!(step = index + 1, %instruction, "navigation instruction");
        true
    }

    fn owns(session: &Session, token: &CancelToken) -> bool {
        session.token.as_ref().is_some_and(|t| t.same_as(token))
    }

    fn check_obstacle(&self) {
        let Some(distance) = self.deps.sensor.read().distance_cm() else {
            return;
        };
        if distance < self.deps.obstacle_cm {
            let instruction = format!(
                "Obstacle detected ahead at {} centimeters. Be careful!",
                format_cm(distance)
            );
            self.publish_instruction(&instruction, InstructionKind::Alert);
            self.deps.buzzer.pulse(OBSTACLE_PULSE);
            tracing::info!(distance_cm = distance, "navigation obstacle alert");
        }
    }

    fn publish_instruction(&self, instruction: &str, kind: InstructionKind) {
        self.deps.events.publish(EventKind::NavigationInstruction {
            instruction: instruction.to_string(),
            kind,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
