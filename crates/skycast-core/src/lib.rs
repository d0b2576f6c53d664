pub mod config;
pub mod error;

pub use config::{Config, ConfigStore, Location, TemperatureUnit, ValidationResult};
pub use error::{AppError, ConfigError, FetchError, LocationError, ReqwestErrorExt};

use anyhow::Result;

/// Initialize the core: tracing/logging for the whole process.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Skycast core initialized");
    Ok(())
}
