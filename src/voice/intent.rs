//! Mapping recognized text to commands

use std::sync::Arc;

use crate::dispatch::Command;
use crate::services::TextModel;

/// Spoken phrases and the command each one triggers, matched by substring in order
pub const PHRASES: &[(&str, Command)] = &[
    ("describe scene", Command::DescribeScene),
    ("read text", Command::ReadText),
    ("detect objects", Command::DetectObjects),
    ("recognize face", Command::RecognizeFace),
    ("check obstacle", Command::CheckObstacle),
    ("toggle light", Command::ToggleLight),
    ("turn on light", Command::ToggleLight),
    ("turn off light", Command::ToggleLight),
    ("trigger buzzer", Command::TriggerBuzzer),
    ("emergency alert", Command::EmergencyAlert),
    ("where am i", Command::AnnounceLocation),
    ("get location", Command::AnnounceLocation),
    ("what's the weather", Command::AnnounceWeather),
    ("repeat last", Command::RepeatLast),
    ("start navigation", Command::StartNavigation),
    ("stop navigation", Command::StopNavigation),
    ("stop speaking", Command::StopSpeaking),
    ("send status update", Command::SendStatusUpdate),
];

/// Resolves free text to a command, asking the text model first when configured
#[derive(Clone, Default)]
pub struct IntentResolver {
    model: Option<Arc<dyn TextModel>>,
}

impl IntentResolver {
    #[must_use]
    pub fn new(model: Option<Arc<dyn TextModel>>) -> Self {
        Self { model }
    }

    /// Best matching command, or `None` when nothing fits
    #[must_use]
    pub fn resolve(&self, text: &str) -> Option<Command> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if let Some(model) = &self.model {
            match model.complete(&intent_prompt(&text)) {
                Ok(answer) => {
                    if let Some(command) = parse_model_answer(&answer) {
                        tracing::info!(%text, command = %command, "model matched intent");
                        return Some(command);
                    }
                    tracing::debug!(%answer, "model gave no usable command");
                }
                Err(e) => tracing::error!(error = %e, "intent model failed, falling back to keywords"),
            }
        }

        let command = match_keywords(&text);
        match command {
            Some(command) => tracing::info!(%text, command = %command, "keyword matched intent"),
            None => tracing::warn!(%text, "could not map text to any known command"),
        }
        command
    }
}

/// First phrase contained in `text`
#[must_use]
pub fn match_keywords(text: &str) -> Option<Command> {
    let text = text.to_lowercase();
    PHRASES
        .iter()
        .find(|(phrase, _)| text.contains(phrase))
        .map(|&(_, command)| command)
}

fn intent_prompt(text: &str) -> String {
    let mut names: Vec<&str> = Vec::new();
    for (_, command) in PHRASES {
        let name = command.name();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    format!(
        "The user of an assistive device for the visually impaired said: '{text}'. \
         Which of the following system commands is the best match? \
         System commands: [{}]. \
         Respond with ONLY the single best-matching command name from the list, or 'unknown' if there is no good match.",
        names.join(", ")
    )
}

fn parse_model_answer(answer: &str) -> Option<Command> {
    let answer = answer.trim().to_lowercase().replace('`', "");
    let command = answer.parse::<Command>().ok()?;
    PHRASES
        .iter()
        .any(|&(_, c)| c == command)
        .then_some(command)
}
