//! Command dispatch from remote names, voice text and gestures

use std::sync::Arc;
use std::time::Duration;

use assistive_lens::events::CommandStatus;
use assistive_lens::{CommandArgs, EventKind, Services};

mod common;
use common::{
    FakeFrames, FakeLocation, FakeText, FakeVision, FakeWeather, Harness, test_config, wait_until,
};

fn with_vision(answer: &'static str) -> Services {
    Services {
        frames: Some(Arc::new(FakeFrames)),
        vision: Some(Arc::new(FakeVision(answer))),
        ..Services::default()
    }
}

fn message(text: &str) -> CommandArgs {
    CommandArgs {
        message: Some(text.to_string()),
        ..CommandArgs::default()
    }
}

#[test]
fn test_unknown_command() {
    let mut harness = Harness::basic();

    let ack = harness.device.dispatch("fly_away", CommandArgs::default());
    assert_eq!(ack.status, CommandStatus::Unknown);
    assert!(harness.renderer.wait_for("Unknown command: fly_away."));

    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        EventKind::CommandAck { status: CommandStatus::Unknown, command, .. } if command == "fly_away"
    )));
}

#[test]
fn test_known_command_is_processing() {
    let harness = Harness::basic();

    let ack = harness.device.dispatch("toggle_led", CommandArgs::default());
    assert_eq!(ack.command, "toggle_light");
    assert_eq!(ack.status, CommandStatus::Processing);
    assert!(ack.error.is_none());
    assert!(harness.renderer.wait_for("LED is now ON"));

    harness.device.dispatch("toggle_light", CommandArgs::default());
    assert!(harness.renderer.wait_for("LED is now OFF"));
    assert!(!harness.device.status().led_on);
}

#[test]
fn test_repeat_last() {
    let harness = Harness::basic();

    harness.device.dispatch("repeat_last", CommandArgs::default());
    assert!(harness.renderer.wait_for("No previous response to repeat."));

    harness.device.speak("Turn right at the corner.");
    harness.device.dispatch("repeat_last", CommandArgs::default());
    assert!(harness.renderer.wait_for("Repeating: Turn right at the corner."));
}

#[test]
fn test_caretaker_message() {
    let mut harness = Harness::basic();

    let ack = harness.device.dispatch("caretaker_message", message("  "));
    assert_eq!(ack.status, CommandStatus::Failed);
    assert_eq!(ack.error.as_deref(), Some("No message content provided."));
    assert!(harness.renderer.wait_for("Error: No message content received."));

    let ack = harness.device.dispatch("caretaker_message", message("Dinner is ready"));
    assert_eq!(ack.status, CommandStatus::Processing);
    assert!(harness.renderer.wait_for("Message from caretaker: Dinner is ready"));

    assert!(wait_until(Duration::from_secs(1), || harness
        .drain_events()
        .iter()
        .any(|e| matches!(
            e,
            EventKind::SystemStatus { message } if message == "Caretaker message received: Dinner is ready"
        ))));
}

#[test]
fn test_vision_results_are_prefixed() {
    let harness = Harness::start(test_config(), with_vision("a park bench"));

    harness.device.dispatch("describe_scene", CommandArgs::default());
    assert!(harness.renderer.wait_for("Analyzing the scene..."));
    assert!(harness.renderer.wait_for("Scene: a park bench"));

    harness.device.dispatch("read_text", CommandArgs::default());
    assert!(harness.renderer.wait_for("I read: a park bench"));

    harness.device.dispatch("detect_objects", CommandArgs::default());
    assert!(harness.renderer.wait_for("Objects detected: a park bench"));

    harness.device.dispatch("recognize_face", CommandArgs::default());
    assert!(harness.renderer.wait_for("I don't detect a human face."));
}

#[test]
fn test_vision_without_camera() {
    let services = Services {
        vision: Some(Arc::new(FakeVision("unused"))),
        ..Services::default()
    };
    let harness = Harness::start(test_config(), services);

    harness.device.dispatch("describe_scene", CommandArgs::default());
    assert!(harness.renderer.wait_for("Sorry, I can't capture an image to describe the scene."));
}

#[test]
fn test_emergency_with_client_location() {
    let mut harness = Harness::basic();
    harness.device.set_client_location(1.5, 103.8);

    harness.device.dispatch("emergency_alert", CommandArgs::default());
    let expected = "Emergency alert activated. Seeking help. Current approximate location: Latitude 1.5000, Longitude 103.8000.";
    assert!(harness.renderer.wait_for(expected));
    assert!(harness.buzzer.pulses().contains(&Duration::from_secs(1)));

    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        EventKind::EmergencyAlert { message } if message == expected
    )));
}

#[test]
fn test_emergency_without_location() {
    let harness = Harness::basic();

    harness.device.dispatch("emergency_alert", CommandArgs::default());
    assert!(harness.renderer.wait_for("Emergency alert activated. Seeking help."));
    assert!(!harness.renderer.has_spoken("location"));
}

#[test]
fn test_location_and_weather() {
    let services = Services {
        location: Some(Arc::new(FakeLocation)),
        weather: Some(Arc::new(FakeWeather)),
        ..Services::default()
    };
    let harness = Harness::start(test_config(), services);

    harness.device.dispatch("announce_location", CommandArgs::default());
    assert!(harness.renderer.wait_for("You are near Leeds, United Kingdom."));

    harness.device.dispatch("announce_weather", CommandArgs::default());
    assert!(harness.renderer.wait_for("Getting the weather forecast..."));
    assert!(harness.renderer.wait_for("Currently light rain in Leeds."));
}

#[test]
fn test_weather_without_location() {
    let services = Services {
        weather: Some(Arc::new(FakeWeather)),
        ..Services::default()
    };
    let harness = Harness::start(test_config(), services);

    harness.device.dispatch("announce_weather", CommandArgs::default());
    assert!(harness.renderer.wait_for(
        "I need your location to get the weather, but I couldn't find it."
    ));
}

#[test]
fn test_status_update_goes_to_caretaker() {
    let mut harness = Harness::start(
        test_config(),
        Services {
            location: Some(Arc::new(FakeLocation)),
            ..Services::default()
        },
    );

    harness.device.dispatch("send_status_update_to_caretaker", CommandArgs::default());
    assert!(harness.renderer.wait_for("Sending status update to caretaker."));

    let mut events = Vec::new();
    assert!(wait_until(Duration::from_secs(1), || {
        events.extend(harness.drain_events());
        events.iter().any(|e| matches!(e, EventKind::UserMessage { .. }))
    }));
    assert!(events.contains(&EventKind::UserMessage {
        message: "User is currently at Leeds, United Kingdom and is okay. If more help is needed, I will alert."
            .to_string(),
    }));
}

#[test]
fn test_voice_text_keyword_intent() {
    let harness = Harness::start(test_config(), with_vision("a red door"));

    harness.device.on_voice_text("could you describe scene please");
    assert!(harness.renderer.wait_for("Scene: a red door"));

    harness.device.on_voice_text("sing me a song");
    assert!(harness.renderer.wait_for("Sorry, I couldn't understand that command."));
}

#[test]
fn test_voice_text_model_intent() {
    let services = Services {
        text: Some(Arc::new(FakeText("check_obstacle"))),
        ..Services::default()
    };
    let harness = Harness::start(test_config(), services);
    harness.sensor.set(120.0);

    harness.device.on_voice_text("is anything in front of me");
    assert!(harness.renderer.wait_for("Obstacle is at 120.0 centimeters."));
}

#[test]
fn test_voice_input_unavailable() {
    let harness = Harness::basic();

    harness.device.dispatch("toggle_voice_input", CommandArgs::default());
    assert!(harness.renderer.wait_for("Voice input is not available."));
    assert!(!harness.device.state().listening());
}
