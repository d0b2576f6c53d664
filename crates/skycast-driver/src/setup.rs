//! Setup flow: user input to a saved, verified configuration.

use std::collections::HashMap;
use std::sync::Arc;

use skycast_core::{Config, ConfigError, FetchError, LocationError, TemperatureUnit};
use skycast_weather::{LocationResolver, PollerConfig, WeatherPoller, WeatherSource};
use thiserror::Error;

const LOCATION_KEY: &str = "location";
const UNIT_KEY: &str = "temp_unit";

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Location is required")]
    EmptyLocation,

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("Test fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Weather entity is still initializing")]
    InitializationInProgress,
}

impl SetupError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SetupError::EmptyLocation => "Location cannot be empty.",
            SetupError::Location(e) => e.user_message(),
            SetupError::Fetch(e) => e.user_message(),
            SetupError::Config(e) => e.user_message(),
            SetupError::InitializationInProgress => {
                "The weather entity is still starting. Try again in a moment."
            }
        }
    }
}

/// Values entered on the remote's setup screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub location: String,
    pub temperature_unit: TemperatureUnit,
}

impl SetupRequest {
    pub fn new(location: impl Into<String>, temperature_unit: TemperatureUnit) -> Self {
        Self {
            location: location.into(),
            temperature_unit,
        }
    }

    /// Build from setup input values. An unknown or missing unit falls back to Fahrenheit.
    pub fn from_input_values(values: &HashMap<String, String>) -> Self {
        let location = values
            .get(LOCATION_KEY)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let temperature_unit: TemperatureUnit = values
            .get(UNIT_KEY)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        Self {
            location,
            temperature_unit,
        }
    }
}

/// Resolves and test-fetches a configuration before anything is saved.
pub struct SetupFlow {
    resolver: LocationResolver,
    source: Arc<dyn WeatherSource>,
    poller_config: PollerConfig,
}

impl SetupFlow {
    pub fn new(
        resolver: LocationResolver,
        source: Arc<dyn WeatherSource>,
        poller_config: PollerConfig,
    ) -> Self {
        Self {
            resolver,
            source,
            poller_config,
        }
    }

    /// The returned config has a resolved location and has served one fetch.
    pub async fn verify(&self, request: SetupRequest) -> Result<Config, SetupError> {
        let input = request.location.trim();
        if input.is_empty() {
            return Err(SetupError::EmptyLocation);
        }

        tracing::info!("Setting up location: {}", input);
        let location = self.resolver.resolve(input).await?;
        tracing::info!(
            "Resolved {} to {} ({}, {})",
            input,
            location.name,
            location.latitude,
            location.longitude
        );

        let config = Config::new(location, request.temperature_unit);
        let test_fetch = WeatherPoller::new(self.source.clone(), self.poller_config.clone());
        test_fetch.fetch_once(&config).await?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_request_from_input_values() {
        let request =
            SetupRequest::from_input_values(&values(&[("location", " 10001 "), ("temp_unit", "celsius")]));
        assert_eq!(request.location, "10001");
        assert_eq!(request.temperature_unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_request_defaults_to_fahrenheit() {
        let request = SetupRequest::from_input_values(&values(&[("location", "Paris, France")]));
        assert_eq!(request.temperature_unit, TemperatureUnit::Fahrenheit);

        let request =
            SetupRequest::from_input_values(&values(&[("location", "Paris"), ("temp_unit", "kelvin")]));
        assert_eq!(request.temperature_unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn test_missing_location_is_empty() {
        let request = SetupRequest::from_input_values(&HashMap::new());
        assert!(request.location.is_empty());
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            SetupError::EmptyLocation.user_message(),
            "Location cannot be empty."
        );
    }
}
