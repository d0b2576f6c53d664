//! Forward geocoding: turn user input into a [`Location`].
//! Uses the Open-Meteo geocoding API - free, no API key required.

use reqwest::Client;
use serde::Deserialize;
use skycast_core::{Location, LocationError, ReqwestErrorExt};
use std::time::Duration;
use url::Url;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const RESULT_COUNT: &str = "5";
const USER_AGENT: &str = concat!("skycast/", env!("CARGO_PKG_VERSION"));
const UNITED_STATES: &str = "US";
/// Provider mode that derives the timezone from the coordinates on each request.
const AUTO_TIMEZONE: &str = "auto";

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"), ("AK", "Alaska"), ("AZ", "Arizona"), ("AR", "Arkansas"),
    ("CA", "California"), ("CO", "Colorado"), ("CT", "Connecticut"), ("DE", "Delaware"),
    ("DC", "District of Columbia"), ("FL", "Florida"), ("GA", "Georgia"), ("HI", "Hawaii"),
    ("ID", "Idaho"), ("IL", "Illinois"), ("IN", "Indiana"), ("IA", "Iowa"),
    ("KS", "Kansas"), ("KY", "Kentucky"), ("LA", "Louisiana"), ("ME", "Maine"),
    ("MD", "Maryland"), ("MA", "Massachusetts"), ("MI", "Michigan"), ("MN", "Minnesota"),
    ("MS", "Mississippi"), ("MO", "Missouri"), ("MT", "Montana"), ("NE", "Nebraska"),
    ("NV", "Nevada"), ("NH", "New Hampshire"), ("NJ", "New Jersey"), ("NM", "New Mexico"),
    ("NY", "New York"), ("NC", "North Carolina"), ("ND", "North Dakota"), ("OH", "Ohio"),
    ("OK", "Oklahoma"), ("OR", "Oregon"), ("PA", "Pennsylvania"), ("RI", "Rhode Island"),
    ("SC", "South Carolina"), ("SD", "South Dakota"), ("TN", "Tennessee"), ("TX", "Texas"),
    ("UT", "Utah"), ("VT", "Vermont"), ("VA", "Virginia"), ("WA", "Washington"),
    ("WV", "West Virginia"), ("WI", "Wisconsin"), ("WY", "Wyoming"),
];

/// Full state name for a US state abbreviation or name, case-insensitive.
fn us_state(qualifier: &str) -> Option<&'static str> {
    US_STATES
        .iter()
        .find(|(abbr, name)| {
            abbr.eq_ignore_ascii_case(qualifier) || name.eq_ignore_ascii_case(qualifier)
        })
        .map(|(_, name)| *name)
}

/// Shape of a location string, inferred from its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationQuery {
    /// US ZIP code, optional +4 suffix kept separately
    PostalCode { code: String, plus4: Option<String> },
    /// "Austin, TX" or "Austin, Texas"; `region` holds the full state name
    CityRegion { city: String, region: String },
    /// "London, UK" or "Paris, France"
    CityCountry { city: String, country: String },
    /// A bare place name
    Place(String),
}

impl LocationQuery {
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LocationError::Invalid("location cannot be empty".to_string()));
        }

        if let Some(query) = parse_postal_code(input) {
            return Ok(query);
        }

        let Some((city, qualifier)) = input.split_once(',') else {
            return Ok(Self::Place(input.to_string()));
        };

        let city = city.trim();
        let qualifier = qualifier.trim();
        if city.is_empty() || qualifier.is_empty() {
            return Err(LocationError::Invalid(format!(
                "expected \"City, Region\" or \"City, Country\", got '{}'",
                input
            )));
        }

        Ok(match us_state(qualifier) {
            Some(region) => Self::CityRegion {
                city: city.to_string(),
                region: region.to_string(),
            },
            None => Self::CityCountry {
                city: city.to_string(),
                country: qualifier.to_string(),
            },
        })
    }

    /// The name sent to the geocoder.
    fn search_term(&self) -> &str {
        match self {
            Self::PostalCode { code, .. } => code,
            Self::CityRegion { city, .. } | Self::CityCountry { city, .. } => city,
            Self::Place(name) => name,
        }
    }

    /// Narrow the geocoder results to those matching the qualifier.
    fn select(&self, results: Vec<GeocodingResult>) -> Option<GeocodingResult> {
        match self {
            Self::PostalCode { .. } => {
                let mut results = results;
                let us_index = results
                    .iter()
                    .position(|r| r.country_code.as_deref() == Some(UNITED_STATES));
                match us_index {
                    Some(i) => Some(results.swap_remove(i)),
                    None => results.into_iter().next(),
                }
            }
            Self::CityRegion { region, .. } => results.into_iter().find(|r| {
                r.country_code.as_deref() == Some(UNITED_STATES)
                    && r.admin1
                        .as_deref()
                        .is_some_and(|a| a.eq_ignore_ascii_case(region))
            }),
            Self::CityCountry { country, .. } => {
                let code = country_code_alias(country);
                results.into_iter().find(|r| {
                    r.country_code
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(code))
                        || r.country
                            .as_deref()
                            .is_some_and(|c| c.eq_ignore_ascii_case(country))
                })
            }
            Self::Place(_) => results.into_iter().next(),
        }
    }
}

fn parse_postal_code(input: &str) -> Option<LocationQuery> {
    let (code, plus4) = match input.split_once('-') {
        Some((code, plus4)) => (code, Some(plus4)),
        None => (input, None),
    };

    let is_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(code, 5) {
        return None;
    }
    if let Some(suffix) = plus4 {
        if !is_digits(suffix, 4) {
            return None;
        }
    }

    Some(LocationQuery::PostalCode {
        code: code.to_string(),
        plus4: plus4.map(str::to_string),
    })
}

/// Common names people type that are not ISO 3166 codes.
fn country_code_alias(country: &str) -> &str {
    match country.to_ascii_uppercase().as_str() {
        "UK" | "ENGLAND" | "SCOTLAND" | "WALES" => "GB",
        "USA" => UNITED_STATES,
        _ => country,
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country_code: Option<String>,
    country: Option<String>,
    /// State/province
    admin1: Option<String>,
    timezone: Option<String>,
}

impl GeocodingResult {
    fn display_name(&self) -> String {
        let is_us = self.country_code.as_deref() == Some(UNITED_STATES);
        match (&self.admin1, &self.country) {
            (Some(state), _) if is_us && !state.is_empty() => format!("{}, {}", self.name, state),
            (_, Some(country)) if !country.is_empty() => format!("{}, {}", self.name, country),
            _ => self.name.clone(),
        }
    }

    fn into_location(self, input: &str) -> Location {
        let name = self.display_name();
        let timezone = match self.timezone {
            Some(tz) if !tz.is_empty() => tz,
            _ => {
                tracing::warn!("No timezone for {}, using provider auto mode", name);
                AUTO_TIMEZONE.to_string()
            }
        };
        Location {
            input: input.trim().to_string(),
            name,
            latitude: self.latitude,
            longitude: self.longitude,
            timezone,
        }
    }
}

/// Resolves free-text locations through the geocoding service.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    client: Client,
    base_url: Url,
}

impl LocationResolver {
    pub fn new() -> Result<Self, LocationError> {
        Self::with_base_url(GEOCODING_URL)
    }

    /// Point the resolver at another endpoint (tests, mirrors).
    pub fn with_base_url(base_url: &str) -> Result<Self, LocationError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LocationError::Invalid(format!("bad geocoding url: {}", e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ReqwestErrorExt::into_location_error)?;
        Ok(Self { client, base_url })
    }

    /// Geocode `input`; fails with `NotFound` when nothing (or nothing unambiguous) matches.
    pub async fn resolve(&self, input: &str) -> Result<Location, LocationError> {
        let query = LocationQuery::parse(input)?;
        tracing::info!("Geocoding location '{}' as {:?}", input.trim(), query);

        let url = Url::parse_with_params(
            self.base_url.as_str(),
            &[
                ("name", query.search_term()),
                ("count", RESULT_COUNT),
                ("language", "en"),
                ("format", "json"),
            ],
        )
        .map_err(|e| LocationError::Invalid(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ReqwestErrorExt::into_location_error)?;

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(ReqwestErrorExt::into_location_error)?;

        if body.results.is_empty() {
            tracing::debug!("Geocoder returned no results for '{}'", input.trim());
            return Err(LocationError::NotFound(input.trim().to_string()));
        }

        let result = query
            .select(body.results)
            .ok_or_else(|| LocationError::NotFound(input.trim().to_string()))?;

        let location = result.into_location(input);
        tracing::info!(
            "Geocoded to: {} ({}, {}) [{}]",
            location.name,
            location.latitude,
            location.longitude,
            location.timezone
        );
        Ok(location)
    }
}
