//! `OpenWeather` current conditions and spoken summaries

use std::time::Duration;

use serde::Deserialize;

use super::{TextModel, WeatherReport, WeatherService};
use crate::{Error, Result};

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    weather: Vec<Condition>,
    main: Option<MainBlock>,
    wind: Option<Wind>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

impl From<WeatherResponse> for WeatherReport {
    fn from(r: WeatherResponse) -> Self {
        let main = r.main.unwrap_or(MainBlock {
            temp: None,
            feels_like: None,
            humidity: None,
        });
        Self {
            description: r.weather.into_iter().next().and_then(|c| c.description),
            temperature_celsius: main.temp,
            feels_like_celsius: main.feels_like,
            wind_speed_mps: r.wind.and_then(|w| w.speed),
            humidity_percent: main.humidity,
            city: r.name,
        }
    }
}

/// Blocking `OpenWeather` client (metric units)
pub struct OpenWeatherService {
    client: reqwest::blocking::Client,
    api_key: String,
}

impl OpenWeatherService {
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenWeather API key required".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, api_key })
    }
}

impl WeatherService for OpenWeatherService {
    fn current(&self, latitude: f64, longitude: f64) -> Result<WeatherReport> {
        let response = self
            .client
            .get(OPENWEATHER_URL)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Error::Weather(format!("request failed: {e}")))?;

        let data: WeatherResponse = response
            .json()
            .map_err(|e| Error::Weather(format!("parse error: {e}")))?;
        tracing::info!("fetched weather data");
        Ok(data.into())
    }
}

/// Prompt asking the text model for a spoken weather summary
///
/// # Errors
///
/// Returns error if the report cannot be serialized
pub fn summary_prompt(report: &WeatherReport) -> Result<String> {
    let data = serde_json::to_string(report)?;
    Ok(format!(
        "You are an assistant for a visually impaired person. Based on the following weather data, \
         provide a simple, helpful, and descriptive summary. Mention what it feels like and suggest \
         if special clothing like a jacket or umbrella is needed. Weather data: {data}"
    ))
}

/// Templated summary used when no text model is available
#[must_use]
pub fn plain_summary(report: &WeatherReport) -> String {
    let mut parts = Vec::new();
    match (&report.description, &report.city) {
        (Some(desc), Some(city)) => parts.push(format!("Currently {desc} in {city}.")),
        (Some(desc), None) => parts.push(format!("Currently {desc}.")),
        _ => {}
    }
    if let Some(temp) = report.temperature_celsius {
        parts.push(format!("The temperature is {temp:.0} degrees Celsius."));
    }
    if let Some(feels) = report.feels_like_celsius {
        parts.push(format!("It feels like {feels:.0} degrees."));
    }
    if let Some(wind) = report.wind_speed_mps {
        parts.push(format!("Wind speed is {wind:.1} meters per second."));
    }
    if parts.is_empty() {
        "Weather data is available but incomplete.".to_string()
    } else {
        parts.join(" ")
    }
}

/// Spoken weather summary, via the text model when present
///
/// # Errors
///
/// Returns error if the text model call fails
pub fn summarize(report: &WeatherReport, text: Option<&dyn TextModel>) -> Result<String> {
    match text {
        Some(model) => model.complete(&summary_prompt(report)?),
        None => Ok(plain_summary(report)),
    }
}
