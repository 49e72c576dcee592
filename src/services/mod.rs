//! External collaborators
//!
//! Camera frames, the vision/text model, geolocation and weather are all
//! consumed through the narrow traits below. Every call is blocking and is
//! only ever made from a command thread.

pub mod camera;
pub mod gemini;
pub mod location;
pub mod vision;
pub mod weather;

use std::sync::Arc;

use serde::Serialize;

use crate::Result;
use crate::config::Config;
use crate::state::SharedStateRef;
use crate::voice::{CommandRecognizer, SpeechRecognizer};

pub use camera::StillImageSource;
pub use gemini::GeminiClient;
pub use location::{IpLocationService, Locator};
pub use vision::{Vision, VisionError};
pub use weather::OpenWeatherService;

/// Source of camera frames
pub trait FrameSource: Send + Sync {
    /// Capture one JPEG-encoded frame
    ///
    /// # Errors
    ///
    /// Returns error if no frame could be captured
    fn capture_jpeg(&self) -> Result<Vec<u8>>;
}

/// Multimodal model answering a prompt about an image
pub trait VisionModel: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the model call fails
    fn analyze(&self, prompt: &str, jpeg: &[u8]) -> Result<String>;
}

/// Text-only model
pub trait TextModel: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the model call fails
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Network geolocation
pub trait LocationService: Send + Sync {
    /// Look up the current location; `None` when the service cannot tell
    ///
    /// # Errors
    ///
    /// Returns error if the lookup request fails
    fn lookup(&self) -> Result<Option<Location>>;
}

/// Current weather conditions
pub trait WeatherService: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the weather request fails
    fn current(&self, latitude: f64, longitude: f64) -> Result<WeatherReport>;
}

/// Where a location came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    /// Coordinates pushed by the remote client
    Client,
    /// IP geolocation
    Network,
}

/// A resolved location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub country: String,
    pub source: LocationSource,
}

/// The subset of weather data used for announcements
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherReport {
    pub description: Option<String>,
    pub temperature_celsius: Option<f64>,
    pub feels_like_celsius: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub city: Option<String>,
}

/// All external collaborators, each optional
#[derive(Clone, Default)]
pub struct Services {
    pub frames: Option<Arc<dyn FrameSource>>,
    pub vision: Option<Arc<dyn VisionModel>>,
    pub text: Option<Arc<dyn TextModel>>,
    pub location: Option<Arc<dyn LocationService>>,
    pub weather: Option<Arc<dyn WeatherService>>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
}

impl Services {
    /// Build the HTTP-backed collaborators the configuration enables
    ///
    /// Must be called outside of an async context: the clients are blocking.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut services = Self::default();

        match &config.services.gemini_api_key {
            Some(key) => match GeminiClient::new(key.clone(), config.services.gemini_model.clone()) {
                Ok(client) => {
                    let client = Arc::new(client);
                    services.vision = Some(client.clone());
                    services.text = Some(client);
                }
                Err(e) => tracing::warn!(error = %e, "Gemini client unavailable"),
            },
            None => tracing::warn!("GEMINI_API_KEY not set, vision and text features disabled"),
        }

        if config.features.camera {
            match &config.services.still_image {
                Some(path) => services.frames = Some(Arc::new(StillImageSource::new(path.clone()))),
                None => tracing::warn!("no camera frame source configured, image features disabled"),
            }
        }

        if config.features.location {
            match IpLocationService::new() {
                Ok(service) => services.location = Some(Arc::new(service)),
                Err(e) => tracing::warn!(error = %e, "IP geolocation unavailable"),
            }
        }

        match &config.services.openweather_api_key {
            Some(key) => match OpenWeatherService::new(key.clone()) {
                Ok(service) => services.weather = Some(Arc::new(service)),
                Err(e) => tracing::warn!(error = %e, "weather service unavailable"),
            },
            None => tracing::warn!("OPENWEATHER_API_KEY not set, weather features disabled"),
        }

        if config.features.voice_input {
            match &config.services.recognizer_command {
                Some(command) => {
                    services.recognizer = Some(Arc::new(CommandRecognizer::new(
                        command.clone(),
                        config.services.recognizer_timeout,
                    )));
                }
                None => tracing::warn!("no speech recognizer configured, voice input disabled"),
            }
        }

        services
    }

    /// Vision facade over the frame source and model
    #[must_use]
    pub fn vision(&self) -> Vision {
        Vision::new(self.frames.clone(), self.vision.clone())
    }

    /// Location resolver honouring client-provided coordinates
    #[must_use]
    pub fn locator(&self, state: SharedStateRef, enabled: bool) -> Locator {
        Locator::new(state, self.location.clone(), enabled)
    }
}
