//! Command handlers
//!
//! Each handler runs on its own command thread. Collaborator failures end up
//! as a spoken sentence and a status event; nothing propagates out.

use std::time::Duration;

use super::{Command, CommandArgs, CommandDispatcher, Context};
use crate::events::{EventBus, EventKind};
use crate::proximity::format_cm;
use crate::services::location::describe_location;
use crate::services::{Location, LocationSource, Vision, VisionError, weather};
use crate::speech::Announcer;

/// Pulse for the buzzer command
const BUZZER_PULSE: Duration = Duration::from_millis(500);

/// Pulse for an emergency alert
const EMERGENCY_PULSE: Duration = Duration::from_secs(1);

const DEFAULT_DESTINATION: &str = "unknown place";
const TOGGLE_DESTINATION: &str = "unknown";

pub(super) fn run(dispatcher: &CommandDispatcher, command: Command, args: CommandArgs) {
    let ctx = dispatcher.ctx.as_ref();
    let suffix = args.prompt_suffix.as_deref().unwrap_or_default();

    match command {
        Command::DescribeScene => describe_scene(&ctx.announcer, &ctx.events, &ctx.vision, suffix),
        Command::ReadText => read_text(ctx),
        Command::DetectObjects => detect_objects(ctx, suffix),
        Command::RecognizeFace => recognize_face(ctx),
        Command::CheckObstacle => check_obstacle(ctx),
        Command::ToggleLight => toggle_light(ctx),
        Command::TriggerBuzzer => {
            ctx.hardware.buzzer.pulse(BUZZER_PULSE);
            report(ctx, "Buzzer alert activated.");
        }
        Command::EmergencyAlert => emergency_alert(ctx),
        Command::AnnounceLocation => announce_location(ctx),
        Command::AnnounceWeather => announce_weather(ctx),
        Command::ToggleVoiceInput => {
            let on_text = {
                let dispatcher = dispatcher.clone();
                move |text: String| dispatcher.on_voice_text(&text)
            };
            ctx.voice.toggle(on_text);
        }
        Command::RepeatLast => repeat_last(ctx),
        Command::StopSpeaking => {
            ctx.announcer.stop();
            ctx.events.status("Speech stopped.");
        }
        Command::StartNavigation => {
            let destination = args
                .destination
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_DESTINATION);
            ctx.navigation.start(destination);
        }
        Command::StopNavigation => {
            ctx.navigation.stop();
        }
        Command::ToggleNavigation => ctx.navigation.toggle(TOGGLE_DESTINATION),
        Command::CaretakerMessage => {
            let message = args.message.unwrap_or_default();
            tracing::info!(%message, "caretaker message");
            ctx.announcer
                .speak(&format!("Message from caretaker: {message}"));
            ctx.events
                .status(format!("Caretaker message received: {message}"));
        }
        Command::SendStatusUpdate => send_status_update(ctx),
    }
}

/// Speak `message` and mirror it as a status event
fn report(ctx: &Context, message: &str) {
    ctx.announcer.speak(message);
    ctx.events.status(message);
}

pub(super) fn describe_scene(
    announcer: &Announcer,
    events: &EventBus,
    vision: &Vision,
    suffix: &str,
) {
    announcer.speak("Analyzing the scene...");
    let message = match vision.describe_scene(suffix) {
        Ok(description) => format!("Scene: {description}"),
        Err(VisionError::Unavailable) => {
            "Cannot describe scene. Internet connection or AI service is unavailable.".to_string()
        }
        Err(VisionError::NoImage) => "Sorry, I can't capture an image to describe the scene.".to_string(),
        Err(VisionError::Failed(_)) => "Sorry, I couldn't describe the scene at the moment.".to_string(),
    };
    announcer.speak(&message);
    events.status(message);
}

fn read_text(ctx: &Context) {
    ctx.announcer.speak("Reading text...");
    let message = match ctx.vision.read_text() {
        Ok(text) => format!("I read: {text}"),
        Err(VisionError::Unavailable) => {
            "Cannot read text. Internet connection or AI service is unavailable.".to_string()
        }
        Err(VisionError::NoImage) => "Sorry, I can't capture an image to read text.".to_string(),
        Err(VisionError::Failed(_)) => {
            "Sorry, I encountered an error while trying to read text.".to_string()
        }
    };
    report(ctx, &message);
}

fn detect_objects(ctx: &Context, suffix: &str) {
    ctx.announcer.speak("Detecting objects...");
    let message = match ctx.vision.detect_objects(suffix) {
        Ok(objects) => format!("Objects detected: {objects}"),
        Err(VisionError::Unavailable) => {
            "Cannot detect objects. Internet connection or AI service is unavailable.".to_string()
        }
        Err(VisionError::NoImage) => "Sorry, I can't capture an image to detect objects.".to_string(),
        Err(VisionError::Failed(_)) => "Sorry, I couldn't detect objects at the moment.".to_string(),
    };
    report(ctx, &message);
}

fn recognize_face(ctx: &Context) {
    ctx.announcer.speak("Looking for faces...");
    let message = match ctx.vision.recognize_face() {
        Ok(answer) if answer.to_lowercase().contains("face") => {
            format!("I see a face. Description: {answer}")
        }
        Ok(_) => "I don't detect a human face.".to_string(),
        Err(VisionError::Unavailable) => {
            "Cannot recognize faces. Internet connection or AI service is unavailable.".to_string()
        }
        Err(VisionError::NoImage) => {
            "Sorry, I can't capture an image for face recognition.".to_string()
        }
        Err(VisionError::Failed(_)) => {
            "Sorry, I couldn't perform face recognition at this time.".to_string()
        }
    };
    report(ctx, &message);
}

fn check_obstacle(ctx: &Context) {
    ctx.announcer.speak("Checking for obstacles...");
    let message = match ctx.hardware.distance.read().distance_cm() {
        Some(distance) => format!("Obstacle is at {} centimeters.", format_cm(distance)),
        None => "Could not get a clear distance reading.".to_string(),
    };
    report(ctx, &message);
}

fn toggle_light(ctx: &Context) {
    let on = ctx.hardware.led.toggle();
    tracing::info!(on, "status LED toggled");
    report(ctx, if on { "LED is now ON" } else { "LED is now OFF" });
}

fn emergency_alert(ctx: &Context) {
    tracing::warn!("EMERGENCY ALERT ACTIVATED!");
    ctx.hardware.buzzer.pulse(EMERGENCY_PULSE);

    let context = match ctx.locator.current_location() {
        Some(loc) if loc.source == LocationSource::Client => format!(
            " Current approximate location: Latitude {:.4}, Longitude {:.4}.",
            loc.latitude, loc.longitude
        ),
        Some(loc) => format!(
            " Current location: {}, {} (Lat: {:.4}, Lon: {:.4}).",
            loc.city, loc.country, loc.latitude, loc.longitude
        ),
        None => String::new(),
    };

    let message = format!("Emergency alert activated. Seeking help.{context}");
    ctx.announcer.speak(&message);
    ctx.events.publish(EventKind::EmergencyAlert { message });
}

fn announce_location(ctx: &Context) {
    ctx.announcer.speak("Getting your location...");
    let location = ctx.locator.current_location();
    report(ctx, &describe_location(location.as_ref()));
}

fn announce_weather(ctx: &Context) {
    ctx.announcer.speak("Getting the weather forecast...");

    let Some(location) = ctx.locator.current_location() else {
        report(ctx, "I need your location to get the weather, but I couldn't find it.");
        return;
    };

    let fetched = match &ctx.weather {
        Some(service) => service.current(location.latitude, location.longitude),
        None => Err(crate::Error::Weather("no weather service configured".to_string())),
    };
    let report_data = match fetched {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, "weather lookup failed");
            report(ctx, "Sorry, I couldn't retrieve the weather data right now.");
            return;
        }
    };

    match weather::summarize(&report_data, ctx.text.as_deref()) {
        Ok(summary) => report(ctx, &summary),
        Err(e) => {
            tracing::error!(error = %e, "weather summary failed");
            report(ctx, "I have the weather data, but I'm having trouble describing it.");
        }
    }
}

fn repeat_last(ctx: &Context) {
    match ctx.state.last_response() {
        Some(last) => ctx.announcer.speak(&format!("Repeating: {last}")),
        None => ctx.announcer.speak("No previous response to repeat."),
    }
}

fn status_location(location: Option<&Location>) -> String {
    match location {
        Some(loc) if loc.source == LocationSource::Client => format!(
            "Latitude {:.4}, Longitude {:.4}",
            loc.latitude, loc.longitude
        ),
        Some(loc) => format!("{}, {}", loc.city, loc.country),
        None => "unknown location".to_string(),
    }
}

fn send_status_update(ctx: &Context) {
    let location = ctx.locator.current_location();
    let message = format!(
        "User is currently at {} and is okay. If more help is needed, I will alert.",
        status_location(location.as_ref())
    );
    tracing::info!(%message, "sending status update to caretaker");
    ctx.announcer.speak("Sending status update to caretaker.");
    ctx.events.publish(EventKind::UserMessage { message });
    ctx.events.status("Status update sent to caretaker.");
}
