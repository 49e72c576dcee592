//! Telemetry event publishing
//!
//! Every component reports what it is doing through an [`EventBus`]: gestures,
//! proximity tiers, navigation instructions, command acknowledgements. Events
//! are informational only. Publishing never blocks and never fails: with no
//! subscriber attached the event is simply dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::input::{ButtonId, GestureKind};
use crate::proximity::AlertTier;

/// Buffered events per subscriber before the slowest one starts lagging
const BUS_CAPACITY: usize = 256;

/// Status reported back for a dispatched command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Accepted and running on its own thread
    Processing,
    /// Rejected before it started (e.g. missing argument)
    Failed,
    /// Name did not resolve to a known command
    Unknown,
}

/// Kind of navigation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// Step of the guidance sequence
    Guidance,
    /// Obstacle found during a guidance tick
    Alert,
    /// No instruction available this tick
    Status,
}

/// Navigation lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPhase {
    Started,
    Stopped,
}

/// Event payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A button gesture was classified
    GestureDetected {
        button: ButtonId,
        gesture: GestureKind,
    },
    /// A valid proximity sample
    DistanceReading { distance_cm: f64 },
    /// The proximity tier moved between none/warning/critical
    ObstacleTierChanged { from: AlertTier, to: AlertTier },
    /// A warning or critical obstacle alert
    ObstacleAlert {
        level: AlertTier,
        distance_cm: f64,
        message: String,
    },
    /// Navigation session started or stopped
    NavigationStatus {
        status: NavigationPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
        message: String,
    },
    /// A message produced by the guidance loop
    NavigationInstruction {
        instruction: String,
        kind: InstructionKind,
    },
    /// Text handed to the speech queue
    SpeechOutput { message: String },
    /// The current utterance was aborted
    StopSpeech,
    /// Acknowledgement for a dispatched command
    CommandAck {
        command: String,
        status: CommandStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Result or progress of a command
    SystemStatus { message: String },
    /// Emergency alert raised by the user
    EmergencyAlert { message: String },
    /// Message from the user to the caretaker
    UserMessage { message: String },
}

/// A published event
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Unique event ID (UUID v4)
    pub id: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Create a new event with auto-generated `id` and `timestamp`
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
        }
    }
}

/// Non-blocking fan-out of events to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event (best-effort)
    pub fn publish(&self, kind: EventKind) {
        let event = Event::new(kind);
        tracing::trace!(?event, "publishing event");
        // No receivers is not an error: telemetry is optional
        let _ = self.tx.send(event);
    }

    /// Publish a status message
    pub fn status(&self, message: impl Into<String>) {
        self.publish(EventKind::SystemStatus {
            message: message.into(),
        });
    }

    /// Subscribe to all future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.status("nobody listening");
    }

    #[test]
    fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(EventKind::DistanceReading { distance_cm: 42.0 });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::DistanceReading { distance_cm: 42.0 });
        assert!(!event.id.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new(EventKind::GestureDetected {
            button: ButtonId::Button2,
            gesture: GestureKind::DoubleTap,
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "gesture_detected");
        assert_eq!(json["button"], "BUTTON_2");
        assert_eq!(json["gesture"], "double_tap");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_command_ack_omits_empty_error() {
        let event = Event::new(EventKind::CommandAck {
            command: "describe_scene".to_string(),
            status: CommandStatus::Processing,
            error: None,
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["status"], "processing");
        assert!(json.get("error").is_none());
    }
}
