//! Proximity readings, alert tiers and the background monitor
//!
//! The monitor samples the distance sensor on a fixed interval and turns
//! each valid reading into telemetry. Obstacles closer than the warning
//! threshold pulse the buzzer and publish an alert.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use crate::Result;
use crate::config::ProximityConfig;
use crate::events::{EventBus, EventKind};
use crate::hardware::{Buzzer, DistanceSensor};
use crate::task::{self, CancelToken};

/// Closest distance the sensor can measure
pub const MIN_DISTANCE_CM: f64 = 2.0;

/// Farthest distance the sensor can measure
pub const MAX_DISTANCE_CM: f64 = 400.0;

/// Value reported to hosts for an invalid reading
pub const INVALID_SENTINEL: f64 = -1.0;

/// Buzzer pulse for a warning-tier obstacle
pub const WARNING_PULSE: Duration = Duration::from_millis(50);

/// Buzzer pulse for a critical-tier obstacle
pub const CRITICAL_PULSE: Duration = Duration::from_millis(100);

/// Why a reading carries no distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Echo never went high
    EchoStartTimeout,
    /// Echo stayed high too long
    EchoEndTimeout,
    /// Measured distance outside the sensor range
    OutOfRange,
    /// GPIO error while ranging
    Fault,
    /// No sensor attached
    Unavailable,
}

/// One distance sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityReading {
    Valid { distance_cm: f64 },
    Invalid(InvalidReason),
}

impl ProximityReading {
    /// Validate a raw distance against the sensor range
    #[must_use]
    pub fn from_distance(distance_cm: f64) -> Self {
        if (MIN_DISTANCE_CM..=MAX_DISTANCE_CM).contains(&distance_cm) {
            Self::Valid { distance_cm }
        } else {
            Self::Invalid(InvalidReason::OutOfRange)
        }
    }

    #[must_use]
    pub const fn distance_cm(&self) -> Option<f64> {
        match self {
            Self::Valid { distance_cm } => Some(*distance_cm),
            Self::Invalid(_) => None,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Distance, or `-1.0` when invalid
    #[must_use]
    pub fn as_sentinel(&self) -> f64 {
        self.distance_cm().unwrap_or(INVALID_SENTINEL)
    }
}

/// Severity bucket for a valid reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTier {
    #[default]
    None,
    Warning,
    Critical,
}

/// Tier thresholds in centimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning_cm: f64,
    pub critical_cm: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_cm: 100.0,
            critical_cm: 30.0,
        }
    }
}

impl From<&ProximityConfig> for Thresholds {
    fn from(config: &ProximityConfig) -> Self {
        Self {
            warning_cm: config.warning_cm,
            critical_cm: config.critical_cm,
        }
    }
}

impl Thresholds {
    /// Classify a reading; invalid readings have no tier
    #[must_use]
    pub fn classify(&self, reading: ProximityReading) -> Option<AlertTier> {
        let distance = reading.distance_cm()?;
        Some(if distance < self.critical_cm {
            AlertTier::Critical
        } else if distance < self.warning_cm {
            AlertTier::Warning
        } else {
            AlertTier::None
        })
    }
}

/// Format a distance the way it is spoken: one decimal minimum
#[must_use]
pub fn format_cm(distance_cm: f64) -> String {
    if distance_cm.fract() == 0.0 {
        format!("{distance_cm:.1}")
    } else {
        distance_cm.to_string()
    }
}

/// Alert wording for a tier
#[must_use]
pub fn alert_message(tier: AlertTier, distance_cm: f64) -> Option<String> {
    let d = format_cm(distance_cm);
    match tier {
        AlertTier::Critical => Some(format!(
            "Immediate obstacle detected at {d} cm! Clear your path."
        )),
        AlertTier::Warning => Some(format!("Obstacle detected at {d} cm. Be cautious.")),
        AlertTier::None => None,
    }
}

/// Background proximity polling loop
pub struct ProximityMonitor {
    sensor: Arc<dyn DistanceSensor>,
    buzzer: Arc<dyn Buzzer>,
    events: EventBus,
    thresholds: Thresholds,
    interval: Duration,
}

impl ProximityMonitor {
    #[must_use]
    pub fn new(
        sensor: Arc<dyn DistanceSensor>,
        buzzer: Arc<dyn Buzzer>,
        events: EventBus,
        config: &ProximityConfig,
    ) -> Self {
        Self {
            sensor,
            buzzer,
            events,
            thresholds: Thresholds::from(config),
            interval: config.interval,
        }
    }

    /// Process one sample, returning its tier
    ///
    /// `previous` is the tier of the last valid sample and is updated in place.
    pub fn sample(&self, previous: &mut AlertTier) -> Option<AlertTier> {
        let reading = self.sensor.read();
        let tier = self.thresholds.classify(reading)?;
        let distance = reading.as_sentinel();

        self.events
            .publish(EventKind::DistanceReading { distance_cm: distance });

        if tier != *previous {
            tracing::debug!(from = ?previous, to = ?tier, distance_cm = distance, "obstacle tier changed");
            self.events.publish(EventKind::ObstacleTierChanged {
                from: *previous,
                to: tier,
            });
            *previous = tier;
        }

        if let Some(message) = alert_message(tier, distance) {
            let pulse = match tier {
                AlertTier::Critical => CRITICAL_PULSE,
                _ => WARNING_PULSE,
            };
            self.buzzer.pulse(pulse);
            self.events.publish(EventKind::ObstacleAlert {
                level: tier,
                distance_cm: distance,
                message,
            });
            tracing::info!(level = ?tier, distance_cm = distance, "obstacle alert");
        }

        Some(tier)
    }

    /// Run the loop on its own thread until `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns error if the monitor thread cannot be spawned
    pub fn spawn(self, cancel: CancelToken) -> Result<JoinHandle<()>> {
        tracing::info!(interval_ms = self.interval.as_millis(), "proximity monitor started");
        task::spawn_loop("proximity-monitor", move || {
            let mut tier = AlertTier::None;
            while !cancel.is_cancelled() {
                self.sample(&mut tier);
                if cancel.wait_timeout(self.interval) {
                    break;
                }
            }
            tracing::info!("proximity monitor stopped");
        })
    }
}
