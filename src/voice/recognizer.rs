//! Speech recognition backends

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::{Error, Result};

const WAIT_POLL: Duration = Duration::from_millis(20);

/// Blocking speech-to-text
pub trait SpeechRecognizer: Send + Sync {
    /// Listen for one phrase
    ///
    /// Returns `Ok(None)` when nothing intelligible was heard.
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer itself failed
    fn listen(&self) -> Result<Option<String>>;
}

/// Runs a shell command that records one phrase and prints its transcript
///
/// Any recorder/STT pipeline works as long as it writes the text to stdout
/// and exits, e.g. `arecord -d 5 -f S16_LE -r 16000 /tmp/p.wav && whisper-cli -nt -f /tmp/p.wav`.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    command: String,
    timeout: Duration,
}

impl CommandRecognizer {
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn listen(&self) -> Result<Option<String>> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Voice(format!("failed to start recognizer: {e}")))?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!(timeout_ms = self.timeout.as_millis(), "no speech within timeout");
                return Ok(None);
            }
            std::thread::sleep(WAIT_POLL);
        };

        if !status.success() {
            return Err(Error::Voice(format!("recognizer exited with {status}")));
        }

        let mut transcript = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout.read_to_string(&mut transcript)?;
        }
        let transcript = transcript.trim().to_lowercase();
        if transcript.is_empty() {
            return Ok(None);
        }
        tracing::info!(text = %transcript, "speech recognized");
        Ok(Some(transcript))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_is_normalized() {
        let recognizer = CommandRecognizer::new("echo '  Describe Scene '", Duration::from_secs(5));
        assert_eq!(recognizer.listen().unwrap().as_deref(), Some("describe scene"));
    }

    #[test]
    fn test_silence_is_none() {
        let recognizer = CommandRecognizer::new("true", Duration::from_secs(5));
        assert_eq!(recognizer.listen().unwrap(), None);

        let slow = CommandRecognizer::new("exec sleep 5", Duration::from_millis(100));
        assert_eq!(slow.listen().unwrap(), None);
    }

    #[test]
    fn test_failure_is_error() {
        let recognizer = CommandRecognizer::new("exit 3", Duration::from_secs(5));
        assert!(recognizer.listen().is_err());
    }
}
