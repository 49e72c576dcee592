//! Gesture classification
//!
//! Each button runs an independent state machine over its press/release
//! edges:
//!
//! ```text
//! Idle --press--> Pressed --release < L--> AwaitingSecondTap --D elapses--> single_press
//!                    |                          |
//!                    +--held L--> long_press    +--press, release within D--> double_tap
//! ```
//!
//! A second press that turns out not to be a double tap (released after `D`,
//! or held into a long press) still emits the first tap's `single_press`
//! ahead of its own gesture.
//!
//! [`ChannelMachine`] is the pure state machine; it never sleeps and reports
//! which timer to arm. [`GestureClassifier`] owns one machine per button
//! behind its own mutex and runs the timers. Every timer carries the
//! machine's generation at arming time and is discarded if any edge has
//! moved the machine on, so cancellation is atomic with respect to edges.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use super::{ButtonId, EdgeEvent, GestureEvent, GestureKind, Level};
use crate::config::GestureConfig;
use crate::task::{TimerHandle, timer};

/// Receiver of classified gestures
pub type GestureSink = Arc<dyn Fn(GestureEvent) + Send + Sync>;

/// Timers a channel can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires after `L` if the button is still held
    LongPress,
    /// Fires after `D` if no second tap arrived
    Confirm,
}

/// A timer the caller must arm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub kind: TimerKind,
    pub generation: u64,
    pub delay: Duration,
}

/// Result of feeding one input to a [`ChannelMachine`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Gestures completed by this input, oldest first
    pub gestures: Vec<GestureKind>,
    /// Timer to arm; any previously armed timer is stale
    pub arm: Option<TimerRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Idle,
    Pressed { since: Instant },
    AwaitingSecondTap,
}

/// Per-button classification state
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    /// A first tap whose confirmation was overtaken by a second press
    single_pending: bool,
    last_press: Option<Instant>,
    generation: u64,
    long_press: Duration,
    double_tap: Duration,
}

impl ChannelMachine {
    #[must_use]
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            state: ChannelState::Idle,
            single_pending: false,
            last_press: None,
            generation: 0,
            long_press: config.long_press,
            double_tap: config.double_tap_window,
        }
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        matches!(self.state, ChannelState::Pressed { .. })
    }

    /// Feed one debounced edge
    pub fn on_edge(&mut self, level: Level, at: Instant) -> Step {
        if level.is_pressed() {
            self.on_press(at)
        } else {
            self.on_release(at)
        }
    }

    fn on_press(&mut self, at: Instant) -> Step {
        // A press is always authoritative and supersedes any armed timer. A
        // tap awaiting confirmation is carried over until this press resolves
        if self.state == ChannelState::AwaitingSecondTap {
            self.single_pending = true;
        }
        self.generation += 1;
        self.state = ChannelState::Pressed { since: at };
        Step {
            gestures: Vec::new(),
            arm: Some(TimerRequest {
                kind: TimerKind::LongPress,
                generation: self.generation,
                delay: self.long_press,
            }),
        }
    }

    fn on_release(&mut self, at: Instant) -> Step {
        let ChannelState::Pressed { since } = self.state else {
            // Release after a fired long press, or with no press seen
            return Step::default();
        };
        self.generation += 1;

        if at.saturating_duration_since(since) >= self.long_press {
            // The long-press timer lost the race with this release
            return self.finish(GestureKind::LongPress);
        }

        let second_tap = self.single_pending
            && self
                .last_press
                .is_some_and(|prev| at.saturating_duration_since(prev) < self.double_tap);
        if second_tap {
            self.single_pending = false;
            return self.finish(GestureKind::DoubleTap);
        }

        // Too slow for a double tap: the first tap stands on its own and this
        // one starts a fresh cycle
        let mut gestures = Vec::new();
        if std::mem::take(&mut self.single_pending) {
            gestures.push(GestureKind::SinglePress);
        }
        self.last_press = Some(at);
        self.state = ChannelState::AwaitingSecondTap;
        Step {
            gestures,
            arm: Some(TimerRequest {
                kind: TimerKind::Confirm,
                generation: self.generation,
                delay: self.double_tap,
            }),
        }
    }

    /// Feed a timer expiry; stale timers are ignored
    pub fn on_timer(&mut self, kind: TimerKind, generation: u64) -> Vec<GestureKind> {
        if generation != self.generation {
            return Vec::new();
        }
        match (kind, self.state) {
            (TimerKind::LongPress, ChannelState::Pressed { .. }) => {
                self.generation += 1;
                self.finish(GestureKind::LongPress).gestures
            }
            (TimerKind::Confirm, ChannelState::AwaitingSecondTap) => {
                self.generation += 1;
                self.finish(GestureKind::SinglePress).gestures
            }
            _ => Vec::new(),
        }
    }

    /// Complete the cycle with `gesture`, after any tap still owed
    fn finish(&mut self, gesture: GestureKind) -> Step {
        let mut gestures = Vec::with_capacity(2);
        if std::mem::take(&mut self.single_pending) {
            gestures.push(GestureKind::SinglePress);
        }
        gestures.push(gesture);
        self.state = ChannelState::Idle;
        self.last_press = None;
        Step {
            gestures,
            arm: None,
        }
    }
}

struct Slot {
    machine: ChannelMachine,
    pending: Option<TimerHandle>,
}

/// Threaded gesture classifier for all buttons
pub struct GestureClassifier {
    slots: [Mutex<Slot>; 4],
    sink: GestureSink,
    this: Weak<Self>,
}

impl GestureClassifier {
    #[must_use]
    pub fn new(config: &GestureConfig, sink: GestureSink) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            slots: std::array::from_fn(|_| {
                Mutex::new(Slot {
                    machine: ChannelMachine::new(config),
                    pending: None,
                })
            }),
            sink,
            this: this.clone(),
        })
    }

    /// Feed one debounced edge
    pub fn on_edge(&self, edge: EdgeEvent) {
        tracing::trace!(button = %edge.button, level = ?edge.level, "edge");
        let gestures = {
            let mut slot = self.lock(edge.button);
            let before = slot.machine.generation();
            let step = slot.machine.on_edge(edge.level, edge.at);
            if slot.machine.generation() != before {
                if let Some(stale) = slot.pending.take() {
                    stale.cancel();
                }
                if let Some(request) = step.arm {
                    slot.pending = self.arm(edge.button, request);
                }
            }
            step.gestures
        };

        for kind in gestures {
            self.emit(edge.button, kind);
        }
    }

    /// Whether a button is currently held
    #[must_use]
    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.lock(button).machine.is_pressed()
    }

    fn arm(&self, button: ButtonId, request: TimerRequest) -> Option<TimerHandle> {
        let this = self.this.clone();
        let name = format!("gesture-{}", button.as_str().to_lowercase());
        let result = timer::after(&name, request.delay, move || {
            if let Some(classifier) = this.upgrade() {
                classifier.on_timer(button, request.kind, request.generation);
            }
        });
        match result {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(button = %button, error = %e, "failed to arm gesture timer");
                None
            }
        }
    }

    fn on_timer(&self, button: ButtonId, kind: TimerKind, generation: u64) {
        let gestures = {
            let mut slot = self.lock(button);
            let gestures = slot.machine.on_timer(kind, generation);
            if !gestures.is_empty() {
                slot.pending = None;
            }
            gestures
        };

        for kind in gestures {
            self.emit(button, kind);
        }
    }

    fn emit(&self, button: ButtonId, kind: GestureKind) {
        tracing::info!(button = %button, gesture = %kind, "gesture detected");
        (self.sink)(GestureEvent {
            button,
            kind,
            at: Instant::now(),
        });
    }

    fn lock(&self, button: ButtonId) -> std::sync::MutexGuard<'_, Slot> {
        self.slots[button.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    const L: Duration = Duration::from_millis(1000);
    const D: Duration = Duration::from_millis(400);

    fn machine() -> ChannelMachine {
        ChannelMachine::new(&GestureConfig {
            long_press: L,
            double_tap_window: D,
            ..GestureConfig::default()
        })
    }

    fn ms(base: Instant, n: u64) -> Instant {
        base + Duration::from_millis(n)
    }

    #[test]
    fn test_single_press() {
        let mut m = machine();
        let t = Instant::now();

        let press = m.on_edge(Level::Low, t);
        assert_eq!(press.arm.unwrap().kind, TimerKind::LongPress);

        let release = m.on_edge(Level::High, ms(t, 120));
        assert!(release.gestures.is_empty());
        let confirm = release.arm.unwrap();
        assert_eq!(confirm.kind, TimerKind::Confirm);
        assert_eq!(confirm.delay, D);

        // Stale long-press timer is ignored
        assert!(m.on_timer(TimerKind::LongPress, press.arm.unwrap().generation).is_empty());
        assert_eq!(
            m.on_timer(TimerKind::Confirm, confirm.generation),
            vec![GestureKind::SinglePress]
        );
    }

    #[test]
    fn test_double_tap() {
        let mut m = machine();
        let t = Instant::now();

        m.on_edge(Level::Low, t);
        let first = m.on_edge(Level::High, ms(t, 100)).arm.unwrap();
        m.on_edge(Level::Low, ms(t, 200));
        let second = m.on_edge(Level::High, ms(t, 300));

        assert_eq!(second.gestures, vec![GestureKind::DoubleTap]);
        assert_eq!(second.arm, None);
        // The first tap's confirmation was superseded
        assert!(m.on_timer(TimerKind::Confirm, first.generation).is_empty());
    }

    #[test]
    fn test_long_press_fires_while_held() {
        let mut m = machine();
        let t = Instant::now();

        let arm = m.on_edge(Level::Low, t).arm.unwrap();
        assert_eq!(arm.delay, L);
        assert_eq!(m.on_timer(TimerKind::LongPress, arm.generation), vec![GestureKind::LongPress]);

        // The release completing this cycle produces nothing
        assert_eq!(m.on_edge(Level::High, ms(t, 1500)), Step::default());
    }

    #[test]
    fn test_long_release_racing_timer() {
        let mut m = machine();
        let t = Instant::now();

        let arm = m.on_edge(Level::Low, t).arm.unwrap();
        let release = m.on_edge(Level::High, ms(t, 1000));
        assert_eq!(release.gestures, vec![GestureKind::LongPress]);
        assert!(m.on_timer(TimerKind::LongPress, arm.generation).is_empty());
    }

    /// Drive a channel through timestamped edges, firing every armed timer
    /// whose deadline has passed before the next edge
    fn run(m: &mut ChannelMachine, t: Instant, edges: &[(u64, Level)], until: u64) -> Vec<GestureKind> {
        fn fire_due(
            m: &mut ChannelMachine,
            armed: &mut Option<(TimerRequest, u64)>,
            now: u64,
            out: &mut Vec<GestureKind>,
        ) {
            if let Some((request, deadline)) = *armed {
                if deadline <= now {
                    *armed = None;
                    out.extend(m.on_timer(request.kind, request.generation));
                }
            }
        }

        let mut out = Vec::new();
        let mut armed: Option<(TimerRequest, u64)> = None;
        for &(at, level) in edges {
            fire_due(m, &mut armed, at, &mut out);
            let step = m.on_edge(level, ms(t, at));
            out.extend(step.gestures);
            if let Some(request) = step.arm {
                armed = Some((request, at + u64::try_from(request.delay.as_millis()).unwrap()));
            }
        }
        fire_due(m, &mut armed, until, &mut out);
        out
    }

    #[test]
    fn test_tap_then_hold_keeps_first_tap() {
        let mut m = machine();
        let t = Instant::now();

        m.on_edge(Level::Low, t);
        m.on_edge(Level::High, ms(t, 100));
        let arm = m.on_edge(Level::Low, ms(t, 300)).arm.unwrap();
        assert_eq!(
            m.on_timer(TimerKind::LongPress, arm.generation),
            vec![GestureKind::SinglePress, GestureKind::LongPress]
        );
        assert!(m.on_edge(Level::High, ms(t, 1400)).gestures.is_empty());
    }

    #[test]
    fn test_tap_then_long_release_keeps_first_tap() {
        let mut m = machine();
        let t = Instant::now();

        m.on_edge(Level::Low, t);
        m.on_edge(Level::High, ms(t, 100));
        m.on_edge(Level::Low, ms(t, 300));
        let release = m.on_edge(Level::High, ms(t, 1300));
        assert_eq!(
            release.gestures,
            vec![GestureKind::SinglePress, GestureKind::LongPress]
        );
    }

    #[test]
    fn test_slow_second_tap_is_two_singles() {
        let mut m = machine();
        let t = Instant::now();

        let gestures = run(
            &mut m,
            t,
            &[(0, Level::Low), (100, Level::High), (300, Level::Low), (600, Level::High)],
            2000,
        );
        assert_eq!(gestures, vec![GestureKind::SinglePress, GestureKind::SinglePress]);
    }

    #[test]
    fn test_second_release_within_window_is_double() {
        let mut m = machine();
        let t = Instant::now();

        let gestures = run(
            &mut m,
            t,
            &[(0, Level::Low), (100, Level::High), (300, Level::Low), (450, Level::High)],
            2000,
        );
        assert_eq!(gestures, vec![GestureKind::DoubleTap]);
    }

    #[test]
    fn test_three_slow_taps() {
        let mut m = machine();
        let t = Instant::now();

        let gestures = run(
            &mut m,
            t,
            &[
                (0, Level::Low),
                (100, Level::High),
                (300, Level::Low),
                (600, Level::High),
                (700, Level::Low),
                (1100, Level::High),
            ],
            3000,
        );
        assert_eq!(gestures, vec![GestureKind::SinglePress; 3]);
    }

    #[test]
    fn test_repeated_press_is_authoritative() {
        let mut m = machine();
        let t = Instant::now();

        let first = m.on_edge(Level::Low, t).arm.unwrap();
        let second = m.on_edge(Level::Low, ms(t, 50)).arm.unwrap();
        assert!(second.generation > first.generation);
        assert_eq!(m.on_timer(TimerKind::LongPress, first.generation), None);

        // Duration is measured from the latest press
        let release = m.on_edge(Level::High, ms(t, 1020));
        assert!(release.gestures.is_empty());
    }

    #[test]
    fn test_release_without_press_ignored() {
        let mut m = machine();
        assert_eq!(m.on_edge(Level::High, Instant::now()), Step::default());
    }

    #[test]
    fn test_threaded_single_press() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let classifier = GestureClassifier::new(
            &GestureConfig {
                long_press: Duration::from_millis(300),
                double_tap_window: Duration::from_millis(60),
                ..GestureConfig::default()
            },
            Arc::new(move |g: GestureEvent| {
                let _ = tx.lock().unwrap().send(g);
            }),
        );

        classifier.on_edge(EdgeEvent::now(ButtonId::Button2, Level::Low));
        assert!(classifier.is_pressed(ButtonId::Button2));
        classifier.on_edge(EdgeEvent::now(ButtonId::Button2, Level::High));

        let gesture = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(gesture.button, ButtonId::Button2);
        assert_eq!(gesture.kind, GestureKind::SinglePress);
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    }
}
