use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use skycast_core::TemperatureUnit;
use skycast_driver::{Driver, DriverSettings, LoggingHost, SetupRequest};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    skycast_core::init()?;

    let settings = DriverSettings {
        config_dir: std::env::var_os("SKYCAST_CONFIG_HOME").map(PathBuf::from),
        icon_dir: std::env::var_os("SKYCAST_ICON_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("icons")),
        ..Default::default()
    };

    let driver = Driver::new(settings, Arc::new(LoggingHost))?;

    match std::env::var("SKYCAST_LOCATION") {
        Ok(location) => {
            let unit: TemperatureUnit = match std::env::var("SKYCAST_UNIT") {
                Ok(unit) => unit.parse().context("Invalid SKYCAST_UNIT")?,
                Err(_) => TemperatureUnit::default(),
            };
            match driver.setup(SetupRequest::new(location, unit)).await {
                Ok(outcome) => tracing::info!("Setup finished: {:?}", outcome),
                Err(e) => {
                    tracing::error!("Setup failed: {}", e);
                    eprintln!("{}", e.user_message());
                }
            }
        }
        Err(_) => {
            let outcome = driver.start().await;
            tracing::info!("Startup: {:?}", outcome);
        }
    }

    tracing::info!("Skycast running, press Ctrl-C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    // Graceful shutdown
    driver.shutdown();
    Ok(())
}
