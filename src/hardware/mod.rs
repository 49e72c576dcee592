//! Hardware capability layer
//!
//! Actuators and sensors are consumed through small capability traits. The
//! backend is chosen at startup: sysfs GPIO on a board that exposes it, or
//! no-op implementations that log what they would have done. Each piece
//! degrades independently, so a missing sensor never takes the buzzer down
//! with it.

pub mod buttons;
pub mod gpio;
pub mod noop;
pub mod sysfs;
pub mod ultrasonic;

use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::config::Config;
use crate::input::ButtonId;
use crate::proximity::ProximityReading;

pub use buttons::ButtonPoller;
pub use gpio::{GpioBuzzer, GpioLed};
pub use noop::{NoopBuzzer, NoopLed, NoopSensor};
pub use sysfs::SysfsPin;
pub use ultrasonic::UltrasonicSensor;

/// A digital output line
pub trait OutputPin: Send {
    /// Drive the line high or low
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be written
    fn write(&mut self, high: bool) -> Result<()>;
}

/// A digital input line
pub trait InputPin: Send {
    /// Sample the line
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be read
    fn is_high(&mut self) -> Result<bool>;
}

/// Audible alert actuator
///
/// Implementations serialize physical writes: a pulse is never interleaved
/// with another pulse, whichever thread issues it.
pub trait Buzzer: Send + Sync {
    /// Sound the buzzer for `duration`, blocking the caller meanwhile
    fn pulse(&self, duration: Duration);

    /// Whether a physical buzzer is attached
    fn is_available(&self) -> bool;
}

/// Status light
pub trait StatusLed: Send + Sync {
    /// Switch the light, returning the resulting state
    fn set(&self, on: bool) -> bool;

    /// Invert the light, returning the resulting state
    fn toggle(&self) -> bool {
        self.set(!self.is_on())
    }

    fn is_on(&self) -> bool;
}

/// Distance sensor
pub trait DistanceSensor: Send + Sync {
    /// Take one reading; failures come back as an invalid reading
    fn read(&self) -> ProximityReading;

    /// Whether a physical sensor is attached
    fn is_available(&self) -> bool;
}

/// The actuator and sensor set selected at startup
#[derive(Clone)]
pub struct Hardware {
    pub buzzer: Arc<dyn Buzzer>,
    pub led: Arc<dyn StatusLed>,
    pub distance: Arc<dyn DistanceSensor>,
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hardware")
            .field("buzzer", &self.buzzer.is_available())
            .field("led_on", &self.led.is_on())
            .field("distance", &self.distance.is_available())
            .finish()
    }
}

impl Hardware {
    /// All no-op implementations
    #[must_use]
    pub fn mock() -> Self {
        Self {
            buzzer: Arc::new(NoopBuzzer),
            led: Arc::new(NoopLed::default()),
            distance: Arc::new(NoopSensor),
        }
    }

    /// Select backends from configuration
    ///
    /// Falls back to a no-op for every piece that fails to initialise.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        if config.features.mock_hardware {
            tracing::info!("mock hardware selected, GPIO disabled");
            return Self::mock();
        }
        if !sysfs::is_supported() {
            tracing::warn!("GPIO not available on this host, hardware features disabled");
            return Self::mock();
        }

        let pins = &config.pins;

        let buzzer: Arc<dyn Buzzer> = match SysfsPin::output(pins.buzzer) {
            Ok(pin) => Arc::new(GpioBuzzer::new(pin)),
            Err(e) => {
                tracing::warn!(pin = pins.buzzer, error = %e, "buzzer unavailable");
                Arc::new(NoopBuzzer)
            }
        };

        let led: Arc<dyn StatusLed> = match SysfsPin::output(pins.led) {
            Ok(pin) => Arc::new(GpioLed::new(pin)),
            Err(e) => {
                tracing::warn!(pin = pins.led, error = %e, "status LED unavailable");
                Arc::new(NoopLed::default())
            }
        };

        let distance: Arc<dyn DistanceSensor> = if config.features.distance {
            match SysfsPin::output(pins.trigger).and_then(|t| Ok((t, SysfsPin::input(pins.echo)?))) {
                Ok((trigger, echo)) => {
                    tracing::info!(trigger = pins.trigger, echo = pins.echo, "ultrasonic sensor initialised");
                    Arc::new(UltrasonicSensor::new(trigger, echo))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "distance sensor unavailable");
                    Arc::new(NoopSensor)
                }
            }
        } else {
            Arc::new(NoopSensor)
        };

        Self {
            buzzer,
            led,
            distance,
        }
    }

    /// Open the configured button inputs
    ///
    /// Buttons that fail to open are skipped with a warning.
    #[must_use]
    pub fn button_pins(config: &Config) -> Vec<(ButtonId, SysfsPin)> {
        if config.features.mock_hardware || !sysfs::is_supported() {
            return Vec::new();
        }
        config
            .pins
            .buttons
            .iter()
            .filter_map(|&(id, number)| match SysfsPin::input(number) {
                Ok(pin) => Some((id, pin)),
                Err(e) => {
                    tracing::warn!(button = %id, pin = number, error = %e, "button unavailable");
                    None
                }
            })
            .collect()
    }

    /// Drive every output to its idle state
    pub fn reset_outputs(&self) {
        if self.led.is_on() {
            self.led.set(false);
        }
    }
}
