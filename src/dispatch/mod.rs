//! Command routing
//!
//! Every trigger (a button gesture, a recognized voice intent, a remote
//! command) resolves to exactly one [`Command`] and runs on its own detached
//! thread. The calling thread only publishes the acknowledgement, so edge
//! detection and network calls never wait on each other.

mod handlers;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::config::NavigationConfig;
use crate::events::{CommandStatus, EventBus, EventKind};
use crate::hardware::Hardware;
use crate::input::{ButtonId, GestureEvent, GestureKind};
use crate::navigation::{NavigationDeps, NavigationSession, SceneDescriber};
use crate::services::{Locator, TextModel, Vision, WeatherService};
use crate::speech::Announcer;
use crate::state::SharedStateRef;
use crate::task;
use crate::voice::{IntentResolver, VoiceInput};

/// The fixed command catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    DescribeScene,
    ReadText,
    DetectObjects,
    RecognizeFace,
    CheckObstacle,
    ToggleLight,
    TriggerBuzzer,
    EmergencyAlert,
    AnnounceLocation,
    AnnounceWeather,
    ToggleVoiceInput,
    RepeatLast,
    StopSpeaking,
    StartNavigation,
    StopNavigation,
    ToggleNavigation,
    CaretakerMessage,
    SendStatusUpdate,
}

impl Command {
    pub const ALL: [Self; 18] = [
        Self::DescribeScene,
        Self::ReadText,
        Self::DetectObjects,
        Self::RecognizeFace,
        Self::CheckObstacle,
        Self::ToggleLight,
        Self::TriggerBuzzer,
        Self::EmergencyAlert,
        Self::AnnounceLocation,
        Self::AnnounceWeather,
        Self::ToggleVoiceInput,
        Self::RepeatLast,
        Self::StopSpeaking,
        Self::StartNavigation,
        Self::StopNavigation,
        Self::ToggleNavigation,
        Self::CaretakerMessage,
        Self::SendStatusUpdate,
    ];

    /// Canonical wire name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DescribeScene => "describe_scene",
            Self::ReadText => "read_text",
            Self::DetectObjects => "detect_objects",
            Self::RecognizeFace => "recognize_face",
            Self::CheckObstacle => "check_obstacle",
            Self::ToggleLight => "toggle_light",
            Self::TriggerBuzzer => "trigger_buzzer",
            Self::EmergencyAlert => "emergency_alert",
            Self::AnnounceLocation => "announce_location",
            Self::AnnounceWeather => "announce_weather",
            Self::ToggleVoiceInput => "toggle_voice_input",
            Self::RepeatLast => "repeat_last",
            Self::StopSpeaking => "stop_speaking",
            Self::StartNavigation => "start_navigation",
            Self::StopNavigation => "stop_navigation",
            Self::ToggleNavigation => "toggle_navigation",
            Self::CaretakerMessage => "caretaker_message",
            Self::SendStatusUpdate => "send_status_update",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let alias = match name.as_str() {
            "check_and_announce_distance" => Some(Self::CheckObstacle),
            "toggle_led" => Some(Self::ToggleLight),
            "trigger_alert_buzzer" => Some(Self::TriggerBuzzer),
            "send_status_update_to_caretaker" => Some(Self::SendStatusUpdate),
            _ => None,
        };
        alias
            .or_else(|| Self::ALL.into_iter().find(|c| c.name() == name))
            .ok_or_else(|| Error::Command(format!("unknown command: {s}")))
    }
}

/// Optional arguments carried by a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandArgs {
    /// Extra prompt text for scene description and object detection
    #[serde(default)]
    pub prompt_suffix: Option<String>,

    /// Navigation destination
    #[serde(default)]
    pub destination: Option<String>,

    /// Caretaker message body
    #[serde(default)]
    pub message: Option<String>,
}

/// Acknowledgement returned to whoever issued a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub command: String,
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandAck {
    fn new(command: impl Into<String>, status: CommandStatus, error: Option<String>) -> Self {
        Self {
            command: command.into(),
            status,
            error,
        }
    }
}

/// Which command each button gesture triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureMap(HashMap<(ButtonId, GestureKind), Command>);

impl Default for GestureMap {
    fn default() -> Self {
        use ButtonId::{Button1, Button2, Button3, Button4};
        use GestureKind::{DoubleTap, LongPress, SinglePress};

        Self(HashMap::from([
            ((Button1, SinglePress), Command::DescribeScene),
            ((Button1, DoubleTap), Command::ReadText),
            ((Button1, LongPress), Command::DetectObjects),
            ((Button2, SinglePress), Command::AnnounceLocation),
            ((Button2, DoubleTap), Command::AnnounceWeather),
            ((Button2, LongPress), Command::ToggleNavigation),
            ((Button3, SinglePress), Command::CheckObstacle),
            ((Button3, DoubleTap), Command::TriggerBuzzer),
            ((Button3, LongPress), Command::EmergencyAlert),
            ((Button4, SinglePress), Command::ToggleVoiceInput),
            ((Button4, DoubleTap), Command::RepeatLast),
            ((Button4, LongPress), Command::StopSpeaking),
        ]))
    }
}

impl GestureMap {
    /// A map with no bindings
    #[must_use]
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Bind a gesture, replacing any previous binding
    #[must_use]
    pub fn with(mut self, button: ButtonId, gesture: GestureKind, command: Command) -> Self {
        self.0.insert((button, gesture), command);
        self
    }

    #[must_use]
    pub fn get(&self, button: ButtonId, gesture: GestureKind) -> Option<Command> {
        self.0.get(&(button, gesture)).copied()
    }
}

/// Everything a command handler may touch
pub struct Collaborators {
    pub announcer: Announcer,
    pub events: EventBus,
    pub state: SharedStateRef,
    pub hardware: Hardware,
    pub vision: Vision,
    pub locator: Locator,
    pub weather: Option<Arc<dyn WeatherService>>,
    pub text: Option<Arc<dyn TextModel>>,
    pub voice: VoiceInput,
    pub intents: IntentResolver,
    pub gestures: GestureMap,
    pub navigation: NavigationConfig,
    /// Obstacles closer than this raise an alert during navigation
    pub obstacle_cm: f64,
}

pub(crate) struct Context {
    announcer: Announcer,
    events: EventBus,
    state: SharedStateRef,
    hardware: Hardware,
    vision: Vision,
    locator: Locator,
    weather: Option<Arc<dyn WeatherService>>,
    text: Option<Arc<dyn TextModel>>,
    voice: VoiceInput,
    intents: IntentResolver,
    gestures: GestureMap,
    navigation: Arc<NavigationSession>,
}

/// Routes gestures, voice text and named commands to their handlers
#[derive(Clone)]
pub struct CommandDispatcher {
    ctx: Arc<Context>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(parts: Collaborators) -> Self {
        let describe_scene: SceneDescriber = {
            let announcer = parts.announcer.clone();
            let events = parts.events.clone();
            let vision = parts.vision.clone();
            Arc::new(move |suffix: &str| {
                handlers::describe_scene(&announcer, &events, &vision, suffix);
            })
        };
        let navigation = NavigationSession::new(
            NavigationDeps {
                announcer: parts.announcer.clone(),
                events: parts.events.clone(),
                state: parts.state.clone(),
                sensor: parts.hardware.distance.clone(),
                buzzer: parts.hardware.buzzer.clone(),
                locator: parts.locator.clone(),
                describe_scene,
                obstacle_cm: parts.obstacle_cm,
            },
            parts.navigation,
        );

        Self {
            ctx: Arc::new(Context {
                announcer: parts.announcer,
                events: parts.events,
                state: parts.state,
                hardware: parts.hardware,
                vision: parts.vision,
                locator: parts.locator,
                weather: parts.weather,
                text: parts.text,
                voice: parts.voice,
                intents: parts.intents,
                gestures: parts.gestures,
                navigation,
            }),
        }
    }

    /// The navigation session owned by this dispatcher
    #[must_use]
    pub fn navigation(&self) -> &Arc<NavigationSession> {
        &self.ctx.navigation
    }

    /// The voice listening controller
    #[must_use]
    pub fn voice(&self) -> &VoiceInput {
        &self.ctx.voice
    }

    /// Dispatch a command by name, as received from a remote client
    pub fn dispatch_named(&self, name: &str, args: CommandArgs) -> CommandAck {
        match name.parse::<Command>() {
            Ok(command) => self.dispatch(command, args),
            Err(_) => {
                tracing::warn!(command = %name, "unknown command received");
                self.ctx
                    .announcer
                    .speak(&format!("Unknown command: {name}."));
                self.acknowledge(CommandAck::new(name, CommandStatus::Unknown, None))
            }
        }
    }

    /// Run `command` on its own thread
    pub fn dispatch(&self, command: Command, args: CommandArgs) -> CommandAck {
        if command == Command::CaretakerMessage
            && args.message.as_deref().is_none_or(|m| m.trim().is_empty())
        {
            tracing::warn!("empty caretaker message received");
            self.ctx.announcer.speak("Error: No message content received.");
            return self.acknowledge(CommandAck::new(
                command.name(),
                CommandStatus::Failed,
                Some("No message content provided.".to_string()),
            ));
        }

        tracing::info!(%command, "dispatching command");
        let this = self.clone();
        let spawned = task::spawn_detached(&format!("cmd-{command}"), move || {
            handlers::run(&this, command, args);
        });

        match spawned {
            Ok(()) => self.acknowledge(CommandAck::new(
                command.name(),
                CommandStatus::Processing,
                None,
            )),
            Err(e) => {
                tracing::error!(%command, error = %e, "failed to start command");
                self.ctx
                    .announcer
                    .speak(&format!("Error processing {}.", command.name()));
                self.acknowledge(CommandAck::new(
                    command.name(),
                    CommandStatus::Failed,
                    Some(e.to_string()),
                ))
            }
        }
    }

    /// Handle a classified button gesture
    pub fn dispatch_gesture(&self, gesture: GestureEvent) {
        tracing::info!(button = %gesture.button, gesture = %gesture.kind, "gesture detected");
        self.ctx.events.publish(EventKind::GestureDetected {
            button: gesture.button,
            gesture: gesture.kind,
        });

        match self.ctx.gestures.get(gesture.button, gesture.kind) {
            Some(command) => {
                self.dispatch(command, CommandArgs::default());
            }
            None => {
                tracing::warn!(button = %gesture.button, gesture = %gesture.kind, "no action mapped");
                self.ctx.announcer.speak(&format!(
                    "No action defined for {} {}.",
                    gesture.button, gesture.kind
                ));
            }
        }
    }

    /// Resolve recognized speech to a command and run it
    ///
    /// Intent resolution may call the text model, so it runs off the caller's thread.
    pub fn on_voice_text(&self, text: &str) {
        let this = self.clone();
        let text = text.to_string();
        let spawned = task::spawn_detached("voice-intent", move || {
            match this.ctx.intents.resolve(&text) {
                Some(command) => {
                    this.dispatch(command, CommandArgs::default());
                }
                None => this
                    .ctx
                    .announcer
                    .speak("Sorry, I couldn't understand that command."),
            }
        });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to resolve voice command");
        }
    }

    fn acknowledge(&self, ack: CommandAck) -> CommandAck {
        self.ctx.events.publish(EventKind::CommandAck {
            command: ack.command.clone(),
            status: ack.status,
            error: ack.error.clone(),
        });
        ack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_round_trip() {
        for command in Command::ALL {
            assert_eq!(command.name().parse::<Command>().unwrap(), command);
        }
    }

    #[test]
    fn test_command_aliases() {
        assert_eq!(
            "check_and_announce_distance".parse::<Command>().unwrap(),
            Command::CheckObstacle
        );
        assert_eq!("toggle_led".parse::<Command>().unwrap(), Command::ToggleLight);
        assert_eq!(
            "send_status_update_to_caretaker".parse::<Command>().unwrap(),
            Command::SendStatusUpdate
        );
        assert_eq!(" Describe_Scene ".parse::<Command>().unwrap(), Command::DescribeScene);
        assert!("fly_away".parse::<Command>().is_err());
    }

    #[test]
    fn test_default_gesture_map() {
        let map = GestureMap::default();
        assert_eq!(
            map.get(ButtonId::Button1, GestureKind::DoubleTap),
            Some(Command::ReadText)
        );
        assert_eq!(
            map.get(ButtonId::Button2, GestureKind::LongPress),
            Some(Command::ToggleNavigation)
        );
        assert_eq!(
            map.get(ButtonId::Button3, GestureKind::LongPress),
            Some(Command::EmergencyAlert)
        );
        assert_eq!(
            map.get(ButtonId::Button4, GestureKind::SinglePress),
            Some(Command::ToggleVoiceInput)
        );

        let mut bound = 0;
        for button in ButtonId::ALL {
            for gesture in [GestureKind::SinglePress, GestureKind::DoubleTap, GestureKind::LongPress] {
                if map.get(button, gesture).is_some() {
                    bound += 1;
                }
            }
        }
        assert_eq!(bound, 12);
    }

    #[test]
    fn test_command_args_deserialize() {
        let args: CommandArgs =
            serde_json::from_str(r#"{"destination":"cafe","ignored":1}"#).unwrap();
        assert_eq!(args.destination.as_deref(), Some("cafe"));
        assert!(args.message.is_none());
    }
}
