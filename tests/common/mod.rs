//! Shared test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assistive_lens::hardware::{Buzzer, DistanceSensor, NoopLed};
use assistive_lens::proximity::{InvalidReason, ProximityReading};
use assistive_lens::services::{
    FrameSource, Location, LocationService, LocationSource, TextModel, VisionModel,
    WeatherReport, WeatherService,
};
use assistive_lens::speech::SpeechRenderer;
use assistive_lens::{Config, Device, Event, EventKind, Hardware, Result, Services};
use tokio::sync::broadcast;

/// Speech renderer that records every utterance
#[derive(Default)]
pub struct RecordingRenderer {
    spoken: Mutex<Vec<String>>,
    delay: Duration,
    playing: AtomicBool,
    abort: AtomicBool,
    aborted: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Each utterance takes `delay` unless aborted
    #[must_use]
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn aborted(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    pub fn has_spoken(&self, needle: &str) -> bool {
        self.spoken().iter().any(|s| s.contains(needle))
    }

    /// Block until some utterance contains `needle`
    pub fn wait_for(&self, needle: &str) -> bool {
        wait_until(Duration::from_secs(3), || self.has_spoken(needle))
    }
}

impl SpeechRenderer for RecordingRenderer {
    fn render(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        self.abort.store(false, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);

        let started = Instant::now();
        while started.elapsed() < self.delay {
            if self.abort.swap(false, Ordering::SeqCst) {
                self.aborted.lock().unwrap().push(text.to_string());
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&self) {
        if self.playing.load(Ordering::SeqCst) {
            self.abort.store(true, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Buzzer that records pulse lengths without sleeping
#[derive(Default)]
pub struct RecordingBuzzer {
    pulses: Mutex<Vec<Duration>>,
}

impl RecordingBuzzer {
    pub fn pulses(&self) -> Vec<Duration> {
        self.pulses.lock().unwrap().clone()
    }
}

impl Buzzer for RecordingBuzzer {
    fn pulse(&self, duration: Duration) {
        self.pulses.lock().unwrap().push(duration);
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Distance sensor returning whatever the test set last
pub struct ScriptedSensor {
    reading: Mutex<ProximityReading>,
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self {
            reading: Mutex::new(ProximityReading::Invalid(InvalidReason::EchoStartTimeout)),
        }
    }
}

impl ScriptedSensor {
    pub fn set(&self, distance_cm: f64) {
        *self.reading.lock().unwrap() = ProximityReading::from_distance(distance_cm);
    }

    pub fn set_invalid(&self) {
        *self.reading.lock().unwrap() = ProximityReading::Invalid(InvalidReason::EchoStartTimeout);
    }
}

impl DistanceSensor for ScriptedSensor {
    fn read(&self) -> ProximityReading {
        *self.reading.lock().unwrap()
    }

    fn is_available(&self) -> bool {
        true
    }
}

pub struct FakeFrames;

impl FrameSource for FakeFrames {
    fn capture_jpeg(&self) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

/// Vision model giving the same answer to every prompt
pub struct FakeVision(pub &'static str);

impl VisionModel for FakeVision {
    fn analyze(&self, _prompt: &str, _jpeg: &[u8]) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Text model giving the same answer to every prompt
pub struct FakeText(pub &'static str);

impl TextModel for FakeText {
    fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

pub struct FakeLocation;

impl LocationService for FakeLocation {
    fn lookup(&self) -> Result<Option<Location>> {
        Ok(Some(Location {
            latitude: 53.8,
            longitude: -1.55,
            city: "Leeds".to_string(),
            country: "United Kingdom".to_string(),
            source: LocationSource::Network,
        }))
    }
}

pub struct FakeWeather;

impl WeatherService for FakeWeather {
    fn current(&self, _latitude: f64, _longitude: f64) -> Result<WeatherReport> {
        Ok(WeatherReport {
            description: Some("light rain".to_string()),
            temperature_celsius: Some(11.4),
            city: Some("Leeds".to_string()),
            ..WeatherReport::default()
        })
    }
}

/// Configuration with short timings and no background monitor
#[must_use]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.features.mock_hardware = true;
    config.features.distance = false;
    config.gestures.long_press = Duration::from_millis(150);
    config.gestures.double_tap_window = Duration::from_millis(80);
    config.navigation.period = Duration::from_millis(30);
    config.navigation.grace = Duration::from_millis(30);
    config.proximity.interval = Duration::from_millis(20);
    config.speech.shutdown_timeout = Duration::from_millis(500);
    config
}

/// A running device wired to recording fakes
pub struct Harness {
    pub device: Arc<Device>,
    pub renderer: Arc<RecordingRenderer>,
    pub buzzer: Arc<RecordingBuzzer>,
    pub sensor: Arc<ScriptedSensor>,
    pub events: broadcast::Receiver<Event>,
}

impl Harness {
    pub fn start(config: Config, services: Services) -> Self {
        let renderer = RecordingRenderer::new();
        let buzzer = Arc::new(RecordingBuzzer::default());
        let sensor = Arc::new(ScriptedSensor::default());
        let hardware = Hardware {
            buzzer: buzzer.clone(),
            led: Arc::new(NoopLed::default()),
            distance: sensor.clone(),
        };
        let device = Device::start(config, hardware, services, renderer.clone()).unwrap();
        let events = device.subscribe();
        Self {
            device,
            renderer,
            buzzer,
            sensor,
            events,
        }
    }

    pub fn basic() -> Self {
        Self::start(test_config(), Services::default())
    }

    /// Every event published since the last drain
    pub fn drain_events(&mut self) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => kinds.push(event.kind),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        kinds
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.device.shutdown();
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
