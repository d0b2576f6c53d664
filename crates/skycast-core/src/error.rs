//! Centralized error types for skycast.
//!
//! Every failure either blocks configuration or degrades the displayed
//! entity to unavailable; none of these are fatal to the process.

use thiserror::Error;

/// Top-level error type.
///
/// Use `user_message()` to get a message suitable for the remote's setup screen.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Weather fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a short, non-technical message.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Location(e) => e.user_message(),
            AppError::Fetch(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Failures turning user input into a geocoded location.
///
/// Surfaced at setup time as a rejected configuration; never retried automatically.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("Location '{0}' not found")]
    NotFound(String),

    #[error("Invalid location input: {0}")]
    Invalid(String),

    #[error("Geocoding service error: {0}")]
    Network(String),
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::NotFound(_) => {
                "Location not found. Try a ZIP code, \"City, State\" or \"City, Country\"."
            }
            LocationError::Invalid(_) => "Location cannot be empty.",
            LocationError::Network(_) => {
                "Unable to reach the geocoding service. Check your connection."
            }
        }
    }
}

/// Failures of a single weather fetch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// Connection refused/reset, DNS failure: typical right after device wake.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Weather API returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected current-conditions schema.
    #[error("Malformed weather response: {0}")]
    Malformed(String),

    #[error("No location configured")]
    NotConfigured,
}

impl FetchError {
    /// True for failures worth one retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout => true,
            FetchError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            FetchError::Malformed(_) | FetchError::NotConfigured => false,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "Unable to connect. Check your network.",
            FetchError::Timeout => "The weather service timed out.",
            FetchError::Status { status, .. } if *status >= 500 => {
                "The weather service is having issues. Please try again later."
            }
            FetchError::Status { .. } => "The weather request failed.",
            FetchError::Malformed(_) => "Received unexpected weather data.",
            FetchError::NotConfigured => "Set up a location first.",
        }
    }
}

/// Durable configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Stored file exists but cannot be parsed; callers treat this as unconfigured.
    #[error("Configuration is corrupt: {0}")]
    Corrupt(String),

    #[error("Configuration IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Corrupt(_) => "Saved settings were unreadable. Please set up again.",
            ConfigError::Io(_) => "Failed to save settings. Please try again.",
            ConfigError::Invalid(_) => "Invalid settings. Check your location.",
        }
    }
}

/// Extension trait for classifying reqwest errors.
pub trait ReqwestErrorExt {
    fn into_fetch_error(self) -> FetchError;
    fn into_location_error(self) -> LocationError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_fetch_error(self) -> FetchError {
        if self.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = self.status() {
            FetchError::Status {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            FetchError::Malformed(self.to_string())
        } else {
            // connect, request and body errors all point at the link, not the payload
            FetchError::Transport(self.to_string())
        }
    }

    fn into_location_error(self) -> LocationError {
        LocationError::Network(self.to_string())
    }
}
