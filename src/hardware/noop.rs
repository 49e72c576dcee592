//! No-op hardware for hosts without GPIO

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Buzzer, DistanceSensor, StatusLed};
use crate::proximity::{InvalidReason, ProximityReading};

/// Buzzer that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBuzzer;

impl Buzzer for NoopBuzzer {
    fn pulse(&self, duration: Duration) {
        tracing::debug!(duration_ms = duration.as_millis(), "buzzer pulse (no hardware)");
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// LED that remembers its state without driving anything
#[derive(Debug, Default)]
pub struct NoopLed {
    on: AtomicBool,
}

impl StatusLed for NoopLed {
    fn set(&self, on: bool) -> bool {
        self.on.store(on, Ordering::SeqCst);
        tracing::debug!(on, "status LED switched (no hardware)");
        on
    }

    fn toggle(&self) -> bool {
        let on = !self.on.fetch_xor(true, Ordering::SeqCst);
        tracing::debug!(on, "status LED switched (no hardware)");
        on
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

/// Sensor that never produces a reading
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSensor;

impl DistanceSensor for NoopSensor {
    fn read(&self) -> ProximityReading {
        ProximityReading::Invalid(InvalidReason::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}
