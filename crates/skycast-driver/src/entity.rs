//! Boundary with the remote's entity framework.
//!
//! The host owns registration and rendering; skycast only hands it a value object
//! per update plus availability and device state.

use anyhow::Result;
use serde::Serialize;
use skycast_core::Location;
use skycast_weather::WeatherSnapshot;
use std::path::{Path, PathBuf};

/// Integration-level connection state reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceState {
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    Available,
    Unavailable,
}

/// What the remote renders: media-player style title/subtitle/album/artwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityAttributes {
    /// Location display name
    pub title: String,
    /// Formatted temperature, e.g. "72.5°F"
    pub subtitle: String,
    /// Weather description
    pub album: String,
    /// Icon path the host can load
    pub image: String,
}

/// The single weather entity for the configured location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherEntity {
    pub id: String,
    pub name: String,
    pub location_name: String,
    icon_dir: PathBuf,
}

impl WeatherEntity {
    pub fn new(location: &Location, icon_dir: &Path) -> Self {
        Self {
            id: entity_id(location),
            name: format!("Weather - {}", location.name),
            location_name: location.name.clone(),
            icon_dir: icon_dir.to_path_buf(),
        }
    }

    /// Shown between registration and the first fetch.
    pub fn loading_attributes(&self) -> EntityAttributes {
        EntityAttributes {
            title: self.location_name.clone(),
            subtitle: "Loading...".to_string(),
            album: "Fetching weather...".to_string(),
            image: String::new(),
        }
    }

    pub fn attributes_for(&self, snapshot: &WeatherSnapshot) -> EntityAttributes {
        EntityAttributes {
            title: self.location_name.clone(),
            subtitle: snapshot.formatted_temperature(),
            album: snapshot.description.clone(),
            image: snapshot.icon.resolve_path(&self.icon_dir),
        }
    }

    /// Replaces stale data rather than leaving it on screen.
    pub fn unavailable_attributes(&self) -> EntityAttributes {
        EntityAttributes {
            title: self.location_name.clone(),
            subtitle: "N/A".to_string(),
            album: "Data unavailable".to_string(),
            image: String::new(),
        }
    }
}

/// `weather-<lat>-<lon>` with dots replaced so the host accepts it.
pub fn entity_id(location: &Location) -> String {
    format!("weather-{}-{}", location.latitude, location.longitude).replace('.', "-")
}

/// Commands the remote can send to the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityCommand {
    /// Refresh now
    On,
    Off,
    PlayPause,
    Other(String),
}

impl From<&str> for EntityCommand {
    fn from(command: &str) -> Self {
        match command {
            "on" => Self::On,
            "off" => Self::Off,
            "play_pause" => Self::PlayPause,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    NotFound,
    NotImplemented,
}

/// The host entity framework, as seen from skycast.
pub trait EntityHost: Send + Sync {
    fn register_entity(&self, entity: &WeatherEntity, attributes: &EntityAttributes) -> Result<()>;

    fn remove_entity(&self, entity_id: &str);

    fn update_attributes(&self, entity_id: &str, attributes: &EntityAttributes);

    fn set_availability(&self, entity_id: &str, availability: Availability);

    fn set_device_state(&self, state: DeviceState);
}

/// Host that only logs; used by the standalone binary.
#[derive(Debug, Default)]
pub struct LoggingHost;

impl EntityHost for LoggingHost {
    fn register_entity(&self, entity: &WeatherEntity, attributes: &EntityAttributes) -> Result<()> {
        tracing::info!("Registered entity {} ({}): {:?}", entity.id, entity.name, attributes);
        Ok(())
    }

    fn remove_entity(&self, entity_id: &str) {
        tracing::info!("Removed entity {}", entity_id);
    }

    fn update_attributes(&self, entity_id: &str, attributes: &EntityAttributes) {
        tracing::info!(
            "{}: {} | {} | {} | {}",
            entity_id,
            attributes.title,
            attributes.subtitle,
            attributes.album,
            attributes.image
        );
    }

    fn set_availability(&self, entity_id: &str, availability: Availability) {
        tracing::info!("{} is {:?}", entity_id, availability);
    }

    fn set_device_state(&self, state: DeviceState) {
        tracing::info!("Device state: {:?}", state);
    }
}
