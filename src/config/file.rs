//! TOML configuration file loading
//!
//! Supports `~/.config/assistive-lens/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct LensConfigFile {
    /// Gesture timing
    #[serde(default)]
    pub gestures: GesturesFileConfig,

    /// GPIO pin assignments (BCM numbering)
    #[serde(default)]
    pub pins: PinsFileConfig,

    /// Proximity monitoring
    #[serde(default)]
    pub proximity: ProximityFileConfig,

    /// Navigation guidance
    #[serde(default)]
    pub navigation: NavigationFileConfig,

    /// Speech output
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// External services
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// Remote-control server
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Feature toggles
    #[serde(default)]
    pub features: FeaturesFileConfig,
}

/// Gesture timing configuration
#[derive(Debug, Default, Deserialize)]
pub struct GesturesFileConfig {
    /// Hold duration that counts as a long press
    pub long_press_ms: Option<u64>,

    /// Window in which a second tap makes a double tap
    pub double_tap_ms: Option<u64>,

    /// Hardware debounce window used by the button poller
    pub debounce_ms: Option<u64>,

    /// Capacity of the edge event queue
    pub edge_queue_capacity: Option<usize>,
}

/// GPIO pin configuration
#[derive(Debug, Default, Deserialize)]
pub struct PinsFileConfig {
    pub led: Option<u32>,
    pub buzzer: Option<u32>,
    pub trigger: Option<u32>,
    pub echo: Option<u32>,
    pub button_1: Option<u32>,
    pub button_2: Option<u32>,
    pub button_3: Option<u32>,
    pub button_4: Option<u32>,
}

/// Proximity monitor configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProximityFileConfig {
    pub enabled: Option<bool>,
    pub interval_ms: Option<u64>,
    pub warning_cm: Option<f64>,
    pub critical_cm: Option<f64>,
}

/// Navigation configuration
#[derive(Debug, Default, Deserialize)]
pub struct NavigationFileConfig {
    pub period_secs: Option<u64>,
    pub grace_secs: Option<u64>,
}

/// Speech output configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// "auto", "espeak" or "log"
    pub engine: Option<String>,

    /// Words per minute
    pub rate: Option<u32>,

    pub shutdown_timeout_ms: Option<u64>,
}

/// External service configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServicesFileConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub openweather_api_key: Option<String>,

    /// Still image used as the camera frame on hosts without a camera
    pub still_image: Option<String>,

    /// Shell command that records one phrase and prints its transcript
    pub recognizer_command: Option<String>,

    /// Upper bound on one recognizer run
    pub recognizer_timeout_secs: Option<u64>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
}

/// Feature toggles
#[derive(Debug, Default, Deserialize)]
pub struct FeaturesFileConfig {
    pub camera: Option<bool>,
    pub location: Option<bool>,
    pub distance: Option<bool>,
    pub buttons: Option<bool>,
    pub keyboard: Option<bool>,
    pub voice_input: Option<bool>,
    pub mock_hardware: Option<bool>,
}

/// Load the TOML config file from the standard path (or `LENS_CONFIG`)
///
/// Returns `LensConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> LensConfigFile {
    let path = std::env::var("LENS_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    match path {
        Some(path) => load_config_file_from(&path),
        None => LensConfigFile::default(),
    }
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> LensConfigFile {
    if !path.exists() {
        return LensConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                LensConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            LensConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/assistive-lens/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("assistive-lens").join("config.toml"))
}
