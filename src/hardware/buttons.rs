//! Button edge detection by polling
//!
//! Samples every button line on a short fixed interval and forwards level
//! changes as [`EdgeEvent`]s. A change arriving within the debounce window
//! of the previous accepted edge is held back until the window expires, so a
//! bounce is suppressed but a genuine quick release is not lost.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::InputPin;
use crate::Result;
use crate::input::{ButtonId, EdgeEvent, EdgeSender, Level};
use crate::task::{self, CancelToken};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

struct Line<P> {
    button: ButtonId,
    pin: P,
    level: Level,
    last_edge: Option<Instant>,
}

/// Polls button inputs and feeds the edge channel
pub struct ButtonPoller<P> {
    lines: Vec<Line<P>>,
    debounce: Duration,
    edges: EdgeSender,
}

impl<P: InputPin + 'static> ButtonPoller<P> {
    /// Buttons start released (pulled high)
    #[must_use]
    pub fn new(pins: Vec<(ButtonId, P)>, debounce: Duration, edges: EdgeSender) -> Self {
        let lines = pins
            .into_iter()
            .map(|(button, pin)| Line {
                button,
                pin,
                level: Level::High,
                last_edge: None,
            })
            .collect();
        Self {
            lines,
            debounce,
            edges,
        }
    }

    /// Sample every line once
    pub fn poll(&mut self, now: Instant) {
        for line in &mut self.lines {
            let level = match line.pin.is_high() {
                Ok(true) => Level::High,
                Ok(false) => Level::Low,
                Err(e) => {
                    tracing::trace!(button = %line.button, error = %e, "button read failed");
                    continue;
                }
            };
            if level == line.level {
                continue;
            }
            if line
                .last_edge
                .is_some_and(|prev| now.saturating_duration_since(prev) < self.debounce)
            {
                continue;
            }
            let sent = self.edges.send(EdgeEvent {
                button: line.button,
                level,
                at: now,
            });
            // A dropped edge stays uncommitted and is retried on the next poll
            if sent {
                line.level = level;
                line.last_edge = Some(now);
            }
        }
    }

    /// Poll on a dedicated thread until `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns error if the poller thread cannot be spawned
    pub fn spawn(mut self, cancel: CancelToken) -> Result<JoinHandle<()>> {
        let buttons: Vec<_> = self.lines.iter().map(|l| l.button.as_str()).collect();
        tracing::info!(?buttons, debounce_ms = self.debounce.as_millis(), "button poller started");
        task::spawn_loop("button-poller", move || {
            while !cancel.wait_timeout(POLL_INTERVAL) {
                self.poll(Instant::now());
            }
            tracing::debug!("button poller stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::input::edge_channel;

    #[derive(Clone, Default)]
    struct SharedLevel(Arc<Mutex<bool>>);

    impl SharedLevel {
        fn set(&self, high: bool) {
            *self.0.lock().unwrap() = high;
        }
    }

    impl InputPin for SharedLevel {
        fn is_high(&mut self) -> Result<bool> {
            Ok(*self.0.lock().unwrap())
        }
    }

    #[test]
    fn test_bounce_is_suppressed() {
        let line = SharedLevel::default();
        line.set(true);
        let (tx, rx) = edge_channel(16);
        let mut poller =
            ButtonPoller::new(vec![(ButtonId::Button1, line.clone())], Duration::from_millis(50), tx);
        let t = Instant::now();

        poller.poll(t);
        assert!(rx.try_recv().is_err());

        line.set(false);
        poller.poll(t + Duration::from_millis(5));
        assert_eq!(rx.try_recv().unwrap().level, Level::Low);

        // Bounce back high inside the window
        line.set(true);
        poller.poll(t + Duration::from_millis(10));
        line.set(false);
        poller.poll(t + Duration::from_millis(15));
        assert!(rx.try_recv().is_err());

        // Real release after the window
        line.set(true);
        poller.poll(t + Duration::from_millis(120));
        let edge = rx.try_recv().unwrap();
        assert_eq!(edge.button, ButtonId::Button1);
        assert_eq!(edge.level, Level::High);
    }

    #[test]
    fn test_change_held_through_window_is_reported() {
        let line = SharedLevel::default();
        line.set(true);
        let (tx, rx) = edge_channel(16);
        let mut poller =
            ButtonPoller::new(vec![(ButtonId::Button3, line.clone())], Duration::from_millis(50), tx);
        let t = Instant::now();

        line.set(false);
        poller.poll(t);
        line.set(true);
        poller.poll(t + Duration::from_millis(20));
        poller.poll(t + Duration::from_millis(60));

        let levels: Vec<_> = rx.try_iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![Level::Low, Level::High]);
    }

    #[test]
    fn test_dropped_edge_is_retried() {
        let line = SharedLevel::default();
        line.set(true);
        let (tx, rx) = edge_channel(1);
        let mut poller =
            ButtonPoller::new(vec![(ButtonId::Button2, line.clone())], Duration::from_millis(10), tx);
        let t = Instant::now();

        line.set(false);
        poller.poll(t);
        line.set(true);
        // Queue still holds the press, so this release is dropped
        poller.poll(t + Duration::from_millis(50));

        assert_eq!(rx.try_recv().unwrap().level, Level::Low);
        assert!(rx.try_recv().is_err());

        poller.poll(t + Duration::from_millis(60));
        assert_eq!(rx.try_recv().unwrap().level, Level::High);
    }
}
