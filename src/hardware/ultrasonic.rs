//! HC-SR04 style ultrasonic ranging
//!
//! Emit a 10µs trigger pulse, then time how long the echo line stays high.
//! Both waits are bounded busy loops, so a reading blocks the calling thread
//! for at most ~60ms and never sleeps on the echo.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::{DistanceSensor, InputPin, OutputPin};
use crate::proximity::{InvalidReason, ProximityReading};

/// Time allowed for the echo line to rise after the trigger
pub const ECHO_START_TIMEOUT: Duration = Duration::from_millis(20);

/// Time allowed for the echo line to fall once high
pub const ECHO_END_TIMEOUT: Duration = Duration::from_millis(40);

/// Half the speed of sound in cm/s (34300 / 2)
const HALF_SPEED_OF_SOUND_CM_S: f64 = 17150.0;

/// Trigger pulse width
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Settle time with the trigger low before pulsing
const TRIGGER_SETTLE: Duration = Duration::from_micros(2);

/// Ultrasonic distance sensor on a trigger/echo pin pair
pub struct UltrasonicSensor<T, E> {
    pins: Mutex<(T, E)>,
}

impl<T: OutputPin, E: InputPin> UltrasonicSensor<T, E> {
    pub fn new(trigger: T, echo: E) -> Self {
        Self {
            pins: Mutex::new((trigger, echo)),
        }
    }

    fn measure(trigger: &mut T, echo: &mut E) -> crate::Result<ProximityReading> {
        trigger.write(false)?;
        spin_for(TRIGGER_SETTLE);
        trigger.write(true)?;
        spin_for(TRIGGER_PULSE);
        trigger.write(false)?;

        let wait_start = Instant::now();
        let mut pulse_start = Instant::now();
        while !echo.is_high()? {
            pulse_start = Instant::now();
            if pulse_start.duration_since(wait_start) > ECHO_START_TIMEOUT {
                tracing::warn!("ultrasonic echo pulse start timeout");
                return Ok(ProximityReading::Invalid(InvalidReason::EchoStartTimeout));
            }
        }

        let high_since = Instant::now();
        let mut pulse_end = Instant::now();
        while echo.is_high()? {
            pulse_end = Instant::now();
            if pulse_end.duration_since(high_since) > ECHO_END_TIMEOUT {
                tracing::warn!("ultrasonic echo pulse end timeout");
                return Ok(ProximityReading::Invalid(InvalidReason::EchoEndTimeout));
            }
        }

        let echo_secs = pulse_end.saturating_duration_since(pulse_start).as_secs_f64();
        let distance = (echo_secs * HALF_SPEED_OF_SOUND_CM_S * 100.0).round() / 100.0;
        let reading = ProximityReading::from_distance(distance);
        if !reading.is_valid() {
            tracing::warn!(distance_cm = distance, "invalid ultrasonic distance reading");
        }
        Ok(reading)
    }
}

impl<T, E> DistanceSensor for UltrasonicSensor<T, E>
where
    T: OutputPin,
    E: InputPin,
{
    fn read(&self) -> ProximityReading {
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        let (trigger, echo) = &mut *pins;
        Self::measure(trigger, echo).unwrap_or_else(|e| {
            tracing::error!(error = %e, "error reading distance");
            ProximityReading::Invalid(InvalidReason::Fault)
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Busy-wait for sub-millisecond delays that `thread::sleep` cannot honour
fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
