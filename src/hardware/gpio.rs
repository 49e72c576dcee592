//! GPIO-backed actuators
//!
//! The buzzer and the status LED are single physical outputs shared by
//! several threads. Each driver owns its pin behind a mutex, so a buzzer pulse
//! (on, sleep, off) is never interleaved with another pulse.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{Buzzer, OutputPin, StatusLed};

/// Buzzer on a digital output
pub struct GpioBuzzer<P> {
    pin: Mutex<P>,
}

impl<P: OutputPin> GpioBuzzer<P> {
    /// Wrap a pin, driving it low first
    pub fn new(mut pin: P) -> Self {
        if let Err(e) = pin.write(false) {
            tracing::warn!(error = %e, "failed to reset buzzer pin");
        }
        Self {
            pin: Mutex::new(pin),
        }
    }
}

impl<P: OutputPin> Buzzer for GpioBuzzer<P> {
    fn pulse(&self, duration: Duration) {
        // Held for the whole pulse: concurrent callers queue up here
        let mut pin = self.pin.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = pin.write(true) {
            tracing::error!(error = %e, "error triggering buzzer");
            return;
        }
        std::thread::sleep(duration);
        if let Err(e) = pin.write(false) {
            tracing::error!(error = %e, "error releasing buzzer");
            return;
        }
        tracing::info!(duration_ms = duration.as_millis(), "buzzer triggered");
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Status LED on a digital output
pub struct GpioLed<P> {
    state: Mutex<(P, bool)>,
}

impl<P: OutputPin> GpioLed<P> {
    /// Wrap a pin, switching the LED off first
    pub fn new(mut pin: P) -> Self {
        if let Err(e) = pin.write(false) {
            tracing::warn!(error = %e, "failed to reset LED pin");
        }
        Self {
            state: Mutex::new((pin, false)),
        }
    }
}

impl<P: OutputPin> StatusLed for GpioLed<P> {
    fn set(&self, on: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.0.write(on) {
            Ok(()) => {
                state.1 = on;
                tracing::info!(on, "status LED switched");
            }
            Err(e) => tracing::error!(error = %e, "failed to drive status LED"),
        }
        state.1
    }

    fn toggle(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let target = !state.1;
        match state.0.write(target) {
            Ok(()) => {
                state.1 = target;
                tracing::info!(on = target, "status LED toggled");
            }
            Err(e) => tracing::error!(error = %e, "failed to drive status LED"),
        }
        state.1
    }

    fn is_on(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::Result;

    /// Records every write with a timestamp
    #[derive(Clone, Default)]
    struct TracePin {
        writes: Arc<Mutex<Vec<(bool, Instant)>>>,
    }

    impl OutputPin for TracePin {
        fn write(&mut self, high: bool) -> Result<()> {
            self.writes.lock().unwrap().push((high, Instant::now()));
            Ok(())
        }
    }

    #[test]
    fn test_concurrent_pulses_do_not_interleave() {
        let pin = TracePin::default();
        let writes = Arc::clone(&pin.writes);
        let buzzer = Arc::new(GpioBuzzer::new(pin));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buzzer = Arc::clone(&buzzer);
                std::thread::spawn(move || buzzer.pulse(Duration::from_millis(15)))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let levels: Vec<bool> = writes.lock().unwrap().iter().map(|(l, _)| *l).collect();
        // Initial reset, then strictly alternating on/off pairs
        assert!(!levels[0]);
        let pulses = &levels[1..];
        assert_eq!(pulses.len(), 8);
        for pair in pulses.chunks(2) {
            assert_eq!(pair, [true, false]);
        }
    }

    #[test]
    fn test_led_toggle() {
        let led = GpioLed::new(TracePin::default());
        assert!(!led.is_on());
        assert!(led.toggle());
        assert!(led.is_on());
        assert!(!led.toggle());
        assert!(led.set(true));
    }
}
