//! Speech renderers
//!
//! A renderer turns text into audio and blocks until playback ends or is
//! aborted. Rendering itself is delegated to an external synthesizer.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::{SpeechConfig, SpeechEngine};
use crate::{Error, Result};

/// Synthesizers tried in order
const ESPEAK_BINARIES: [&str; 2] = ["espeak-ng", "espeak"];

const WAIT_POLL: Duration = Duration::from_millis(20);

/// Text-to-speech backend
pub trait SpeechRenderer: Send + Sync {
    /// Play `text`, blocking until it finishes or is aborted
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer fails to start
    fn render(&self, text: &str) -> Result<()>;

    /// Abort the utterance in progress, if any
    fn abort(&self);

    /// Name for logs
    fn name(&self) -> &'static str;
}

/// Renderer that only logs, for hosts without audio
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

impl SpeechRenderer for LogRenderer {
    fn render(&self, text: &str) -> Result<()> {
        tracing::info!(%text, "speaking (no audio)");
        Ok(())
    }

    fn abort(&self) {}

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Renderer that runs a synthesizer as a child process per utterance
///
/// The text is passed as the final argument.
#[derive(Debug)]
pub struct ProcessRenderer {
    program: PathBuf,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl ProcessRenderer {
    /// Locate an espeak binary on `PATH`
    ///
    /// # Errors
    ///
    /// Returns error if no espeak binary is installed
    pub fn detect(rate: u32) -> Result<Self> {
        let program = ESPEAK_BINARIES
            .iter()
            .find_map(|bin| which::which(bin).ok())
            .ok_or_else(|| Error::Speech("espeak not found on PATH".to_string()))?;
        Ok(Self::new(
            program,
            vec!["-s".to_string(), rate.to_string(), "--".to_string()],
        ))
    }

    #[must_use]
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpeechRenderer for ProcessRenderer {
    fn render(&self, text: &str) -> Result<()> {
        {
            // Held across spawn and store so an abort never misses the child
            let mut current = self.lock();
            let child = Command::new(&self.program)
                .args(&self.args)
                .arg(text)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| Error::Speech(format!("failed to start {}: {e}", self.program.display())))?;
            *current = Some(child);
        }

        // Poll rather than wait() so abort() can take the lock and kill
        loop {
            {
                let mut current = self.lock();
                let Some(child) = current.as_mut() else {
                    return Ok(());
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        *current = None;
                        if !status.success() {
                            tracing::debug!(%status, "synthesizer exited with failure");
                        }
                        return Ok(());
                    }
                    Ok(None) => {}
                    Err(e) => {
                        *current = None;
                        return Err(Error::Speech(format!("failed to wait for synthesizer: {e}")));
                    }
                }
            }
            std::thread::sleep(WAIT_POLL);
        }
    }

    fn abort(&self) {
        if let Some(mut child) = self.lock().take() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "synthesizer already exited");
            }
            let _ = child.wait();
            tracing::debug!("utterance aborted");
        }
    }

    fn name(&self) -> &'static str {
        "espeak"
    }
}

/// Pick a renderer for the configured engine
///
/// # Errors
///
/// Returns error if the espeak engine is required but missing
pub fn select(config: &SpeechConfig) -> Result<Arc<dyn SpeechRenderer>> {
    match config.engine {
        SpeechEngine::Log => Ok(Arc::new(LogRenderer)),
        SpeechEngine::Espeak => Ok(Arc::new(ProcessRenderer::detect(config.rate)?)),
        SpeechEngine::Auto => match ProcessRenderer::detect(config.rate) {
            Ok(renderer) => {
                tracing::info!(program = %renderer.program.display(), "using espeak for speech");
                Ok(Arc::new(renderer))
            }
            Err(e) => {
                tracing::warn!(error = %e, "speech audio disabled, logging utterances instead");
                Ok(Arc::new(LogRenderer))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_select_log_engine() {
        let config = SpeechConfig {
            engine: SpeechEngine::Log,
            ..SpeechConfig::default()
        };
        assert_eq!(select(&config).unwrap().name(), "log");
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_kills_running_process() {
        let renderer = Arc::new(ProcessRenderer::new(
            PathBuf::from("sh"),
            vec!["-c".to_string(), "exec sleep 5".to_string(), "sh".to_string()],
        ));
        let aborter = Arc::clone(&renderer);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            aborter.abort();
        });

        let start = Instant::now();
        renderer.render("long utterance").unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_as_render_starts() {
        let renderer = Arc::new(ProcessRenderer::new(
            PathBuf::from("sh"),
            vec!["-c".to_string(), "exec sleep 5".to_string(), "sh".to_string()],
        ));

        for _ in 0..5 {
            let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let aborter = {
                let renderer = Arc::clone(&renderer);
                let done = Arc::clone(&done);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    while !done.load(std::sync::atomic::Ordering::SeqCst) {
                        renderer.abort();
                        std::thread::yield_now();
                    }
                })
            };

            let start = Instant::now();
            barrier.wait();
            renderer.render("interrupted").unwrap();
            done.store(true, std::sync::atomic::Ordering::SeqCst);
            aborter.join().unwrap();
            assert!(start.elapsed() < Duration::from_secs(3));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_render_waits_for_completion() {
        let renderer = ProcessRenderer::new(
            PathBuf::from("sh"),
            vec!["-c".to_string(), "exit 0".to_string(), "sh".to_string()],
        );
        renderer.render("quick").unwrap();
        // Nothing left to abort
        renderer.abort();
    }
}
