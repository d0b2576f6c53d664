//! WMO weather code to display icon mapping.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Icon shown on the remote for a weather condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconId {
    ClearDay,
    ClearNight,
    PartlyCloudyDay,
    PartlyCloudyNight,
    Overcast,
    Fog,
    Drizzle,
    FreezingRain,
    RainLight,
    Rain,
    RainHeavy,
    SnowLight,
    Snow,
    SnowHeavy,
    Hail,
    Thunderstorm,
}

impl IconId {
    /// Generic cloud, used for codes outside the table.
    pub const FALLBACK: IconId = IconId::Overcast;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClearDay => "clear-day",
            Self::ClearNight => "clear-night",
            Self::PartlyCloudyDay => "partly-cloudy-day",
            Self::PartlyCloudyNight => "partly-cloudy-night",
            Self::Overcast => "overcast",
            Self::Fog => "fog",
            Self::Drizzle => "drizzle",
            Self::FreezingRain => "freezing-rain",
            Self::RainLight => "rain-light",
            Self::Rain => "rain",
            Self::RainHeavy => "rain-heavy",
            Self::SnowLight => "snow-light",
            Self::Snow => "snow",
            Self::SnowHeavy => "snow-heavy",
            Self::Hail => "hail",
            Self::Thunderstorm => "thunderstorm",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.png", self.as_str())
    }

    /// Path of the icon asset under `base`, as handed to the host.
    pub fn resolve_path(self, base: &Path) -> String {
        base.join(self.file_name()).to_string_lossy().into_owned()
    }
}

impl std::fmt::Display for IconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the icon for a WMO code. Total: unknown codes get [`IconId::FALLBACK`].
///
/// Only clear and partly-cloudy skies have night variants.
pub fn resolve_icon(code: i32, is_day: bool) -> IconId {
    match (code, is_day) {
        (0 | 1, true) => IconId::ClearDay,
        (0 | 1, false) => IconId::ClearNight,
        (2, true) => IconId::PartlyCloudyDay,
        (2, false) => IconId::PartlyCloudyNight,
        (3, _) => IconId::Overcast,
        (45 | 48, _) => IconId::Fog,
        (51 | 53 | 55, _) => IconId::Drizzle,
        (56 | 57 | 66 | 67, _) => IconId::FreezingRain,
        (61 | 80, _) => IconId::RainLight,
        (63 | 81, _) => IconId::Rain,
        (65 | 82, _) => IconId::RainHeavy,
        (71 | 85, _) => IconId::SnowLight,
        (73 | 86, _) => IconId::Snow,
        (75 | 77, _) => IconId::SnowHeavy,
        (87 | 88, _) => IconId::Hail,
        (95 | 96 | 99, _) => IconId::Thunderstorm,
        _ => IconId::FALLBACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[(&[i32], &str, &str)] = &[
        (&[0, 1], "clear-day", "clear-night"),
        (&[2], "partly-cloudy-day", "partly-cloudy-night"),
        (&[3], "overcast", "overcast"),
        (&[45, 48], "fog", "fog"),
        (&[51, 53, 55], "drizzle", "drizzle"),
        (&[56, 57], "freezing-rain", "freezing-rain"),
        (&[61, 80], "rain-light", "rain-light"),
        (&[63, 81], "rain", "rain"),
        (&[65, 82], "rain-heavy", "rain-heavy"),
        (&[66, 67], "freezing-rain", "freezing-rain"),
        (&[71, 85], "snow-light", "snow-light"),
        (&[73, 86], "snow", "snow"),
        (&[75, 77], "snow-heavy", "snow-heavy"),
        (&[87, 88], "hail", "hail"),
        (&[95, 96, 99], "thunderstorm", "thunderstorm"),
    ];

    #[test]
    fn test_documented_codes() {
        for (codes, day, night) in TABLE {
            for &code in *codes {
                assert_eq!(resolve_icon(code, true).as_str(), *day, "code {} day", code);
                assert_eq!(resolve_icon(code, false).as_str(), *night, "code {} night", code);
            }
        }
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        let known: Vec<i32> = TABLE.iter().flat_map(|(c, _, _)| c.iter().copied()).collect();
        for code in -5..=120 {
            if known.contains(&code) {
                continue;
            }
            assert_eq!(resolve_icon(code, true), IconId::FALLBACK, "code {}", code);
            assert_eq!(resolve_icon(code, false), IconId::FALLBACK, "code {}", code);
        }
        assert_eq!(resolve_icon(i32::MAX, true), IconId::FALLBACK);
        assert_eq!(resolve_icon(i32::MIN, false), IconId::FALLBACK);
    }

    #[test]
    fn test_thunderstorm_ignores_day_flag() {
        assert_eq!(resolve_icon(95, false), IconId::Thunderstorm);
        assert_eq!(resolve_icon(95, true), IconId::Thunderstorm);
    }

    #[test]
    fn test_serde_matches_identifier() {
        let json = serde_json::to_string(&IconId::PartlyCloudyNight).unwrap();
        assert_eq!(json, "\"partly-cloudy-night\"");
    }

    #[test]
    fn test_resolve_path() {
        let path = IconId::Hail.resolve_path(Path::new("/opt/icons"));
        assert_eq!(path, "/opt/icons/hail.png");
    }
}
