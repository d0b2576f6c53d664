use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.json";
const CONFIG_HOME_ENV: &str = "SKYCAST_CONFIG_HOME";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    /// Value of the provider's `temperature_unit` query parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Fahrenheit => "fahrenheit",
            Self::Celsius => "celsius",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Fahrenheit => "°F",
            Self::Celsius => "°C",
        }
    }
}

impl std::str::FromStr for TemperatureUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fahrenheit" | "f" => Ok(Self::Fahrenheit),
            "celsius" | "c" => Ok(Self::Celsius),
            other => Err(ConfigError::Invalid(format!(
                "unknown temperature unit '{}'",
                other
            ))),
        }
    }
}

/// A geocoded location. Immutable once resolved; replaced wholesale on reconfiguration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// What the user typed, e.g. "10001" or "London, UK"
    pub input: String,
    /// Normalized display name, e.g. "New York, New York"
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone identifier, or the provider's "auto" mode
    pub timezone: String,
}

impl Location {
    fn validate_into(&self, result: &mut ValidationResult) {
        if self.name.trim().is_empty() {
            result.add_error("location.name", "Display name must not be empty");
        }
        if self.timezone.trim().is_empty() {
            result.add_error("location.timezone", "Timezone must not be empty");
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            result.add_error(
                "location.latitude",
                format!("Latitude out of range: {}", self.latitude),
            );
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            result.add_error(
                "location.longitude",
                format!("Longitude out of range: {}", self.longitude),
            );
        }
        if self.latitude == 0.0 && self.longitude == 0.0 {
            result.add_warning("location", "Coordinates are exactly (0, 0)");
        }
    }
}

/// Persisted integration settings.
///
/// The configured flag is derived from the fields, see [`Config::is_configured`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub location: Option<Location>,

    #[serde(default)]
    pub temperature_unit: Option<TemperatureUnit>,
}

impl Config {
    pub fn new(location: Location, temperature_unit: TemperatureUnit) -> Self {
        Self {
            location: Some(location),
            temperature_unit: Some(temperature_unit),
        }
    }

    /// True iff both location and unit are present and valid.
    pub fn is_configured(&self) -> bool {
        self.location.is_some() && self.temperature_unit.is_some() && self.validate().is_valid()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        match &self.location {
            Some(location) => location.validate_into(&mut result),
            None => result.add_error("location", "No location configured"),
        }

        if self.temperature_unit.is_none() {
            result.add_error("temperature_unit", "No temperature unit configured");
        }

        result
    }

    /// Unit to use for display, falling back to the default.
    pub fn unit(&self) -> TemperatureUnit {
        self.temperature_unit.unwrap_or_default()
    }
}

/// Durable, crash-safe owner of the [`Config`].
///
/// Reads are served from memory; `save` replaces the file by write-then-rename so a
/// concurrent `reload` observes either the old or the new config, never a mix.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Config>,
}

impl ConfigStore {
    /// Open the store at `dir/config.json`, loading whatever is on disk.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(CONFIG_FILE);
        let current = read_or_unconfigured(&path);
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// Open the store in the default location.
    ///
    /// `$SKYCAST_CONFIG_HOME` wins over the platform config directory.
    pub fn open_default() -> Self {
        Self::open(default_config_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory configuration.
    pub fn load(&self) -> Config {
        self.current.read().clone()
    }

    /// Persist `config` atomically, then make it current.
    pub fn save(&self, config: Config) -> Result<(), ConfigError> {
        let validation = config.validate();
        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&config)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        *self.current.write() = config;
        tracing::info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    /// Re-read durable storage and replace the in-memory config entirely.
    pub fn reload(&self) -> Config {
        tracing::info!("Reloading configuration from {}", self.path.display());
        let fresh = read_or_unconfigured(&self.path);
        *self.current.write() = fresh.clone();
        fresh
    }

    pub fn is_configured(&self) -> bool {
        self.current.read().is_configured()
    }
}

fn default_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_HOME_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skycast")
}

/// Read the config file; a missing or corrupt file yields an unconfigured default.
fn read_or_unconfigured(path: &Path) -> Config {
    match read_config(path) {
        Ok(Some(config)) => {
            tracing::info!("Configuration loaded from {}", path.display());
            config
        }
        Ok(None) => {
            tracing::info!("No configuration at {}, setup required", path.display());
            Config::default()
        }
        Err(e) => {
            tracing::warn!("{} - treating as unconfigured", e);
            Config::default()
        }
    }
}

fn read_config(path: &Path) -> Result<Option<Config>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Corrupt(format!("{}: {}", path.display(), e))),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::Corrupt(format!("{}: {}", path.display(), e)))
}
