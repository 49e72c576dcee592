//! Configuration management for the assistive lens controller

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::input::ButtonId;

use file::LensConfigFile;

/// Default long-press duration
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(1000);

/// Default double-tap window
pub const DEFAULT_DOUBLE_TAP: Duration = Duration::from_millis(400);

/// Default upper bound on one speech recognition run
pub const DEFAULT_RECOGNIZER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default Gemini model for vision and text prompts
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Gesture classification timing
    pub gestures: GestureConfig,

    /// GPIO pin assignments
    pub pins: PinConfig,

    /// Proximity monitor settings
    pub proximity: ProximityConfig,

    /// Navigation guidance settings
    pub navigation: NavigationConfig,

    /// Speech output settings
    pub speech: SpeechConfig,

    /// External service credentials and endpoints
    pub services: ServicesConfig,

    /// Remote-control server settings
    pub server: ServerConfig,

    /// Which subsystems are enabled
    pub features: FeatureToggles,
}

/// Gesture timing configuration
#[derive(Debug, Clone, Copy)]
pub struct GestureConfig {
    /// Hold duration that is classified as a long press
    pub long_press: Duration,

    /// Window in which a second release makes a double tap
    pub double_tap_window: Duration,

    /// Debounce window applied by the input subsystem (not the classifier)
    pub debounce: Duration,

    /// Capacity of the bounded edge queue
    pub edge_queue_capacity: usize,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            long_press: DEFAULT_LONG_PRESS,
            double_tap_window: DEFAULT_DOUBLE_TAP,
            debounce: Duration::from_millis(50),
            edge_queue_capacity: 64,
        }
    }
}

/// GPIO pin assignments (BCM numbering)
#[derive(Debug, Clone)]
pub struct PinConfig {
    pub led: u32,
    pub buzzer: u32,
    pub trigger: u32,
    /// Needs a voltage divider on real hardware
    pub echo: u32,
    pub buttons: Vec<(ButtonId, u32)>,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            led: 18,
            buzzer: 19,
            trigger: 23,
            echo: 24,
            buttons: vec![
                (ButtonId::Button1, 17),
                (ButtonId::Button2, 27),
                (ButtonId::Button3, 22),
                (ButtonId::Button4, 2),
            ],
        }
    }
}

/// Proximity monitor configuration
#[derive(Debug, Clone, Copy)]
pub struct ProximityConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub warning_cm: f64,
    pub critical_cm: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(500),
            warning_cm: 100.0,
            critical_cm: 30.0,
        }
    }
}

/// Navigation guidance configuration
#[derive(Debug, Clone, Copy)]
pub struct NavigationConfig {
    /// Time between guidance ticks
    pub period: Duration,

    /// Delay after the final instruction before the session ends
    pub grace: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
            grace: Duration::from_secs(5),
        }
    }
}

/// Which speech renderer to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechEngine {
    /// Use espeak when installed, otherwise log only
    #[default]
    Auto,
    /// Require an espeak binary
    Espeak,
    /// Log utterances without audio
    Log,
}

impl SpeechEngine {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "espeak" | "espeak-ng" => Some(Self::Espeak),
            "log" | "none" => Some(Self::Log),
            _ => None,
        }
    }
}

/// Speech output configuration
#[derive(Debug, Clone, Copy)]
pub struct SpeechConfig {
    pub engine: SpeechEngine,

    /// Words per minute
    pub rate: u32,

    /// Bounded join on the speech consumer at shutdown
    pub shutdown_timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine: SpeechEngine::Auto,
            rate: 175,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// External service configuration
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// Gemini API key (vision, text, intent resolution)
    pub gemini_api_key: Option<String>,

    /// Gemini model identifier
    pub gemini_model: String,

    /// `OpenWeather` API key
    pub openweather_api_key: Option<String>,

    /// Still image standing in for the camera
    pub still_image: Option<PathBuf>,

    /// Shell command used for speech recognition
    pub recognizer_command: Option<String>,

    /// Upper bound on one recognizer run
    pub recognizer_timeout: Duration,
}

/// Remote-control server configuration
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

/// Subsystem toggles
#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureToggles {
    pub camera: bool,
    pub location: bool,
    pub distance: bool,
    pub buttons: bool,
    pub keyboard: bool,
    pub voice_input: bool,
    /// Use the no-op hardware backend even when GPIO is present
    pub mock_hardware: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            camera: true,
            location: true,
            distance: true,
            buttons: true,
            keyboard: true,
            voice_input: true,
            mock_hardware: false,
        }
    }
}

/// Command-line overrides applied on top of env and file configuration
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Overrides {
    pub port: Option<u16>,
    pub no_camera: bool,
    pub no_location: bool,
    pub no_distance: bool,
    pub no_buttons: bool,
    pub no_keyboard: bool,
    pub no_voice_input: bool,
    pub mock_hardware: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(LensConfigFile::default(), |_| None)
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    #[must_use]
    pub fn load() -> Self {
        Self::load_with_options(&Overrides::default())
    }

    /// Load configuration and apply command-line overrides
    #[must_use]
    pub fn load_with_options(overrides: &Overrides) -> Self {
        let fc = file::load_config_file();
        let mut config = Self::resolve(fc, |key| std::env::var(key).ok());
        config.apply(overrides);
        config
    }

    /// Merge file values with an environment lookup (env > toml > default)
    pub fn resolve(fc: LensConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env_parse = |key: &str| env(key).and_then(|v| v.parse::<u64>().ok());
        let env_bool = |key: &str| {
            env(key).map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        };

        let gesture_defaults = GestureConfig::default();
        let gestures = GestureConfig {
            long_press: env_parse("LENS_LONG_PRESS_MS")
                .or(fc.gestures.long_press_ms)
                .map_or(gesture_defaults.long_press, Duration::from_millis),
            double_tap_window: env_parse("LENS_DOUBLE_TAP_MS")
                .or(fc.gestures.double_tap_ms)
                .map_or(gesture_defaults.double_tap_window, Duration::from_millis),
            debounce: fc
                .gestures
                .debounce_ms
                .map_or(gesture_defaults.debounce, Duration::from_millis),
            edge_queue_capacity: fc
                .gestures
                .edge_queue_capacity
                .filter(|c| *c > 0)
                .unwrap_or(gesture_defaults.edge_queue_capacity),
        };

        let pin_defaults = PinConfig::default();
        let button_overrides = [
            fc.pins.button_1,
            fc.pins.button_2,
            fc.pins.button_3,
            fc.pins.button_4,
        ];
        let pins = PinConfig {
            led: fc.pins.led.unwrap_or(pin_defaults.led),
            buzzer: fc.pins.buzzer.unwrap_or(pin_defaults.buzzer),
            trigger: fc.pins.trigger.unwrap_or(pin_defaults.trigger),
            echo: fc.pins.echo.unwrap_or(pin_defaults.echo),
            buttons: pin_defaults
                .buttons
                .iter()
                .zip(button_overrides)
                .map(|(&(id, pin), over)| (id, over.unwrap_or(pin)))
                .collect(),
        };

        let prox_defaults = ProximityConfig::default();
        let proximity = ProximityConfig {
            enabled: fc.proximity.enabled.unwrap_or(prox_defaults.enabled),
            interval: fc
                .proximity
                .interval_ms
                .map_or(prox_defaults.interval, Duration::from_millis),
            warning_cm: fc.proximity.warning_cm.unwrap_or(prox_defaults.warning_cm),
            critical_cm: fc.proximity.critical_cm.unwrap_or(prox_defaults.critical_cm),
        };

        let nav_defaults = NavigationConfig::default();
        let navigation = NavigationConfig {
            period: fc
                .navigation
                .period_secs
                .map_or(nav_defaults.period, Duration::from_secs),
            grace: fc
                .navigation
                .grace_secs
                .map_or(nav_defaults.grace, Duration::from_secs),
        };

        let speech_defaults = SpeechConfig::default();
        let engine_name = env("LENS_SPEECH_ENGINE").or(fc.speech.engine);
        let engine = match engine_name {
            Some(name) => SpeechEngine::parse(&name).unwrap_or_else(|| {
                tracing::warn!(engine = %name, "unknown speech engine, using auto");
                SpeechEngine::Auto
            }),
            None => speech_defaults.engine,
        };
        let speech = SpeechConfig {
            engine,
            rate: fc.speech.rate.unwrap_or(speech_defaults.rate),
            shutdown_timeout: fc
                .speech
                .shutdown_timeout_ms
                .map_or(speech_defaults.shutdown_timeout, Duration::from_millis),
        };

        let services = ServicesConfig {
            gemini_api_key: env("GEMINI_API_KEY")
                .or(fc.services.gemini_api_key)
                .filter(|k| !k.is_empty()),
            gemini_model: env("LENS_GEMINI_MODEL")
                .or(fc.services.gemini_model)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            openweather_api_key: env("OPENWEATHER_API_KEY")
                .or(fc.services.openweather_api_key)
                .filter(|k| !k.is_empty()),
            still_image: env("LENS_STILL_IMAGE")
                .or(fc.services.still_image)
                .map(PathBuf::from),
            recognizer_command: env("LENS_RECOGNIZER_CMD")
                .or(fc.services.recognizer_command)
                .filter(|c| !c.trim().is_empty()),
            recognizer_timeout: fc
                .services
                .recognizer_timeout_secs
                .map_or(DEFAULT_RECOGNIZER_TIMEOUT, Duration::from_secs),
        };

        let server = ServerConfig {
            port: env("LENS_WEB_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        let feature_defaults = FeatureToggles::default();
        let features = FeatureToggles {
            camera: fc.features.camera.unwrap_or(feature_defaults.camera),
            location: fc.features.location.unwrap_or(feature_defaults.location),
            distance: fc.features.distance.unwrap_or(feature_defaults.distance),
            buttons: fc.features.buttons.unwrap_or(feature_defaults.buttons),
            keyboard: fc.features.keyboard.unwrap_or(feature_defaults.keyboard),
            voice_input: fc
                .features
                .voice_input
                .unwrap_or(feature_defaults.voice_input),
            mock_hardware: env_bool("LENS_MOCK_HARDWARE")
                .or(fc.features.mock_hardware)
                .unwrap_or(feature_defaults.mock_hardware),
        };

        Self {
            gestures,
            pins,
            proximity,
            navigation,
            speech,
            services,
            server,
            features,
        }
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if overrides.no_camera {
            self.features.camera = false;
        }
        if overrides.no_location {
            self.features.location = false;
        }
        if overrides.no_distance {
            self.features.distance = false;
        }
        if overrides.no_buttons {
            self.features.buttons = false;
        }
        if overrides.no_keyboard {
            self.features.keyboard = false;
        }
        if overrides.no_voice_input {
            tracing::info!("voice input explicitly disabled via --no-voice-input");
            self.features.voice_input = false;
        }
        if overrides.mock_hardware {
            self.features.mock_hardware = true;
        }
    }
}
