use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use skycast_core::{Config, ConfigStore};
use skycast_weather::{LocationResolver, OpenMeteoSource, PollerConfig, WeatherSource};

use crate::entity::{CommandStatus, EntityCommand, EntityHost};
use crate::lifecycle::{LifecycleCoordinator, LifecycleEvent, TriggerOutcome};
use crate::setup::{SetupError, SetupFlow, SetupRequest};

/// Everything the driver needs that is not stored configuration.
#[derive(Debug, Clone, Default)]
pub struct DriverSettings {
    /// Directory holding `config.json`; the platform default when unset
    pub config_dir: Option<PathBuf>,
    /// Base directory the host resolves icon files from
    pub icon_dir: PathBuf,
    pub poller: PollerConfig,
    /// Geocoding endpoint override
    pub geocoding_url: Option<String>,
    /// Forecast endpoint override
    pub forecast_url: Option<String>,
}

/// The weather integration as one unit: store, setup flow and lifecycle.
pub struct Driver {
    store: Arc<ConfigStore>,
    coordinator: LifecycleCoordinator,
    setup: SetupFlow,
}

impl Driver {
    pub fn new(settings: DriverSettings, host: Arc<dyn EntityHost>) -> Result<Self> {
        let store = Arc::new(match &settings.config_dir {
            Some(dir) => ConfigStore::open(dir),
            None => ConfigStore::open_default(),
        });
        tracing::info!("Configuration store at {}", store.path().display());

        let source: Arc<dyn WeatherSource> = Arc::new(match &settings.forecast_url {
            Some(url) => OpenMeteoSource::with_base_url(url),
            None => OpenMeteoSource::new(),
        }
        .context("Failed to create weather client")?);

        let resolver = match &settings.geocoding_url {
            Some(url) => LocationResolver::with_base_url(url),
            None => LocationResolver::new(),
        }
        .context("Failed to create geocoding client")?;

        let coordinator = LifecycleCoordinator::new(
            store.clone(),
            host,
            source.clone(),
            settings.poller.clone(),
            settings.icon_dir,
        );
        let setup = SetupFlow::new(resolver, source, settings.poller);

        Ok(Self {
            store,
            coordinator,
            setup,
        })
    }

    /// Initialize proactively if a configuration survived the restart.
    pub async fn start(&self) -> TriggerOutcome {
        tracing::info!("Starting weather driver");
        self.coordinator.on_startup().await
    }

    pub async fn handle_event(&self, event: LifecycleEvent) -> TriggerOutcome {
        self.coordinator.handle_event(event).await
    }

    pub fn handle_command(&self, entity_id: &str, command: &str) -> CommandStatus {
        self.coordinator
            .handle_command(entity_id, EntityCommand::from(command))
    }

    /// Verify the request, save it and rebuild the entity for it.
    ///
    /// Refused while an initialization is running; the stored config is then untouched.
    pub async fn setup(&self, request: SetupRequest) -> Result<TriggerOutcome, SetupError> {
        if self.coordinator.state().initialization_in_flight() {
            return Err(SetupError::InitializationInProgress);
        }

        let config = self.setup.verify(request).await?;
        if let Some(location) = &config.location {
            tracing::info!("Setup verified for {}", location.name);
        }

        match self.coordinator.apply_config(config).await? {
            TriggerOutcome::Rejected => Err(SetupError::InitializationInProgress),
            outcome => Ok(outcome),
        }
    }

    pub fn shutdown(&self) {
        tracing::info!("Shutting down weather driver");
        self.coordinator.shutdown();
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    pub fn config(&self) -> Config {
        self.store.load()
    }
}
