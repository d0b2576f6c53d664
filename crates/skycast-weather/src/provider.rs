use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skycast_core::{FetchError, Location, ReqwestErrorExt, TemperatureUnit};
use std::time::Duration;
use url::Url;

use crate::types::CurrentConditions;

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const CURRENT_FIELDS: &str = "temperature_2m,weather_code,is_day";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One attempt at reading current conditions. No retries at this level.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(
        &self,
        location: &Location,
        unit: TemperatureUnit,
    ) -> Result<CurrentConditions, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<serde_json::Value>,
}

/// Open-Meteo forecast API client.
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    client: Client,
    base_url: Url,
}

impl OpenMeteoSource {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(FORECAST_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::Malformed(format!("bad forecast url: {}", e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(ReqwestErrorExt::into_fetch_error)?;
        Ok(Self { client, base_url })
    }

    fn request_url(&self, location: &Location, unit: TemperatureUnit) -> Result<Url, FetchError> {
        Url::parse_with_params(
            self.base_url.as_str(),
            &[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("temperature_unit", unit.as_param().to_string()),
                ("timezone", location.timezone.clone()),
            ],
        )
        .map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoSource {
    async fn current(
        &self,
        location: &Location,
        unit: TemperatureUnit,
    ) -> Result<CurrentConditions, FetchError> {
        let url = self.request_url(location, unit)?;
        tracing::debug!("Fetching weather from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ReqwestErrorExt::into_fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!("Weather API returned status {}: {}", status, message);
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(ReqwestErrorExt::into_fetch_error)?;
        parse_current(&body)
    }
}

/// Extract the `current` block; anything off-schema is a non-transient failure.
fn parse_current(body: &str) -> Result<CurrentConditions, FetchError> {
    let response: ForecastResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let current = response
        .current
        .ok_or_else(|| FetchError::Malformed("response has no 'current' block".to_string()))?;
    serde_json::from_value(current).map_err(|e| FetchError::Malformed(e.to_string()))
}
