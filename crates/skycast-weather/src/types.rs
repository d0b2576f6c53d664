use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skycast_core::TemperatureUnit;

use crate::icons::{resolve_icon, IconId};

/// Human-readable description of a WMO weather code.
/// See: https://open-meteo.com/en/docs#weathervariables
pub fn describe(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Light rain showers",
        81 => "Moderate rain showers",
        82 => "Heavy rain showers",
        85 => "Light snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// Raw current-conditions record as returned by the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentConditions {
    #[serde(rename = "temperature_2m")]
    pub temperature: f64,
    pub weather_code: i32,
    /// 1 = day, 0 = night
    pub is_day: u8,
}

/// Latest successful observation, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Rounded to one decimal
    pub temperature: f64,
    pub unit: TemperatureUnit,
    pub weather_code: i32,
    pub is_day: bool,
    pub icon: IconId,
    pub description: String,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Build a snapshot from provider data, resolving icon and description.
    pub fn from_conditions(
        conditions: &CurrentConditions,
        unit: TemperatureUnit,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let is_day = conditions.is_day != 0;
        Self {
            temperature: (conditions.temperature * 10.0).round() / 10.0,
            unit,
            weather_code: conditions.weather_code,
            is_day,
            icon: resolve_icon(conditions.weather_code, is_day),
            description: describe(conditions.weather_code).to_string(),
            fetched_at,
        }
    }

    /// e.g. "72.5°F"
    pub fn formatted_temperature(&self) -> String {
        format!("{:.1}{}", self.temperature, self.unit.suffix())
    }
}
