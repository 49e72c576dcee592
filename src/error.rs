//! Error types for the assistive lens controller

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the controller
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// GPIO or actuator error
    #[error("hardware error: {0}")]
    Hardware(String),

    /// Distance sensor error
    #[error("sensor error: {0}")]
    Sensor(String),

    /// Speech output error
    #[error("speech error: {0}")]
    Speech(String),

    /// Vision service error
    #[error("vision error: {0}")]
    Vision(String),

    /// Location lookup error
    #[error("location error: {0}")]
    Location(String),

    /// Weather lookup error
    #[error("weather error: {0}")]
    Weather(String),

    /// Voice input error
    #[error("voice error: {0}")]
    Voice(String),

    /// Command dispatch error
    #[error("command error: {0}")]
    Command(String),

    /// Thread or timer could not be started
    #[error("task error: {0}")]
    Task(String),

    /// Remote API error
    #[error("api error: {0}")]
    Api(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
