//! Desktop keyboard shortcuts
//!
//! Reads one shortcut per line from stdin, for running the controller on a
//! laptop without buttons. An empty line stands in for the space bar.

use std::io::BufRead;

use crate::Result;
use crate::dispatch::Command;
use crate::task;

/// What a shortcut asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Command(Command),
    Quit,
}

/// Map one input line to a shortcut
#[must_use]
pub fn parse_key(line: &str) -> Option<KeyAction> {
    let key = line.trim().to_lowercase();
    let command = match key.as_str() {
        "" | "space" => Command::ToggleVoiceInput,
        "e" | "enter" => Command::EmergencyAlert,
        "b" | "backspace" => Command::RepeatLast,
        "d" => Command::DescribeScene,
        "r" => Command::ReadText,
        "o" => Command::DetectObjects,
        "l" => Command::AnnounceLocation,
        "w" => Command::AnnounceWeather,
        "n" => Command::ToggleNavigation,
        "s" => Command::StopSpeaking,
        "u" => Command::SendStatusUpdate,
        "q" => return Some(KeyAction::Quit),
        _ => return None,
    };
    Some(KeyAction::Command(command))
}

/// Read shortcuts from `reader` on a detached thread until EOF or `q`
///
/// # Errors
///
/// Returns error if the reader thread cannot be spawned
pub fn spawn_keyboard<R, F>(reader: R, on_key: F) -> Result<()>
where
    R: BufRead + Send + 'static,
    F: Fn(KeyAction) + Send + 'static,
{
    tracing::info!("keyboard shortcuts enabled (d r o l w n s u e b q, empty line toggles voice)");
    task::spawn_detached("keyboard", move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "keyboard input failed");
                    break;
                }
            };
            match parse_key(&line) {
                Some(action) => {
                    tracing::info!(key = %line.trim(), ?action, "keyboard shortcut");
                    on_key(action);
                    if action == KeyAction::Quit {
                        break;
                    }
                }
                None => tracing::debug!(key = %line.trim(), "unmapped key"),
            }
        }
    })
}
