//! Location lookup
//!
//! Coordinates pushed by the remote client always win; otherwise the public
//! IP is geolocated.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{Location, LocationService, LocationSource};
use crate::state::SharedStateRef;
use crate::{Error, Result};

const IP_API_URL: &str = "http://ip-api.com/json/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// ip-api.com response
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    city: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// IP geolocation via ip-api.com
pub struct IpLocationService {
    client: reqwest::blocking::Client,
    url: String,
}

impl IpLocationService {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: IP_API_URL.to_string(),
        })
    }
}

impl LocationService for IpLocationService {
    fn lookup(&self) -> Result<Option<Location>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Error::Location(format!("IP lookup failed: {e}")))?;
        let data: IpApiResponse = response
            .json()
            .map_err(|e| Error::Location(format!("parse error: {e}")))?;
        Ok(parse_ip_api(data))
    }
}

fn parse_ip_api(data: IpApiResponse) -> Option<Location> {
    if data.status != "success" {
        tracing::error!(message = ?data.message, "IP-based location lookup failed");
        return None;
    }
    let (Some(latitude), Some(longitude)) = (data.lat, data.lon) else {
        tracing::warn!("IP-based location has no coordinates");
        return None;
    };
    let location = Location {
        latitude,
        longitude,
        city: data.city.unwrap_or_else(|| "Unknown City".to_string()),
        country: data.country.unwrap_or_else(|| "Unknown Country".to_string()),
        source: LocationSource::Network,
    };
    tracing::info!(city = %location.city, country = %location.country, "location found (IP-based)");
    Some(location)
}

/// Resolves the best available location
#[derive(Clone)]
pub struct Locator {
    state: SharedStateRef,
    network: Option<Arc<dyn LocationService>>,
    enabled: bool,
}

impl Locator {
    #[must_use]
    pub fn new(
        state: SharedStateRef,
        network: Option<Arc<dyn LocationService>>,
        enabled: bool,
    ) -> Self {
        Self {
            state,
            network,
            enabled,
        }
    }

    /// Client coordinates if known, else IP geolocation, else `None`
    #[must_use]
    pub fn current_location(&self) -> Option<Location> {
        if !self.enabled {
            tracing::warn!("location services are disabled by configuration");
            return None;
        }

        if let Some(client) = self.state.client_location() {
            tracing::debug!("using client-provided location");
            return Some(Location {
                latitude: client.latitude,
                longitude: client.longitude,
                city: "Client City (approx)".to_string(),
                country: "Client Country (approx)".to_string(),
                source: LocationSource::Client,
            });
        }

        let network = self.network.as_ref()?;
        match network.lookup() {
            Ok(location) => location,
            Err(e) => {
                tracing::error!(error = %e, "could not get current location");
                None
            }
        }
    }
}

/// Sentence announcing a location
#[must_use]
pub fn describe_location(location: Option<&Location>) -> String {
    match location {
        Some(loc) if loc.source == LocationSource::Client => format!(
            "Your current approximate location is Latitude {:.4}, Longitude {:.4}.",
            loc.latitude, loc.longitude
        ),
        Some(loc) => format!("You are near {}, {}.", loc.city, loc.country),
        None => "Could not determine your current location.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClientLocation, SharedState};

    struct FixedNetwork;

    impl LocationService for FixedNetwork {
        fn lookup(&self) -> Result<Option<Location>> {
            Ok(Some(Location {
                latitude: 48.85,
                longitude: 2.35,
                city: "Paris".to_string(),
                country: "France".to_string(),
                source: LocationSource::Network,
            }))
        }
    }

    #[test]
    fn test_client_location_wins() {
        let state = SharedState::new_shared();
        let locator = Locator::new(state.clone(), Some(Arc::new(FixedNetwork)), true);

        let network = locator.current_location().unwrap();
        assert_eq!(describe_location(Some(&network)), "You are near Paris, France.");

        state.set_client_location(ClientLocation {
            latitude: 12.345_678,
            longitude: -1.5,
        });
        let client = locator.current_location().unwrap();
        assert_eq!(
            describe_location(Some(&client)),
            "Your current approximate location is Latitude 12.3457, Longitude -1.5000."
        );
    }

    #[test]
    fn test_disabled_locator() {
        let locator = Locator::new(SharedState::new_shared(), Some(Arc::new(FixedNetwork)), false);
        assert!(locator.current_location().is_none());
        assert_eq!(describe_location(None), "Could not determine your current location.");
    }

    #[test]
    fn test_parse_ip_api_failure() {
        let data: IpApiResponse =
            serde_json::from_str(r#"{"status":"fail","message":"private range"}"#).unwrap();
        assert!(parse_ip_api(data).is_none());

        let data: IpApiResponse = serde_json::from_str(
            r#"{"status":"success","city":"Lyon","country":"France","lat":45.7,"lon":4.8}"#,
        )
        .unwrap();
        assert_eq!(parse_ip_api(data).unwrap().city, "Lyon");
    }
}
