//! Weather service for skycast
//!
//! Geocodes the configured location, fetches current conditions from Open-Meteo
//! and keeps them fresh with an hourly poll loop.

pub mod geocode;
pub mod icons;
pub mod poller;
pub mod provider;
pub mod retry;
pub mod types;

pub use geocode::{LocationQuery, LocationResolver};
pub use icons::{resolve_icon, IconId};
pub use poller::{OnUpdate, PollUpdate, PollerConfig, PollerHandle, WeatherPoller};
pub use provider::{OpenMeteoSource, WeatherSource};
pub use retry::RetryConfig;
pub use types::*;
