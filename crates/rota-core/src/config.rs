use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::constants::DEFAULT_TIMEZONE;
use crate::types::CalendarSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Defaults applied to newly created calendars.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    pub default_timezone: chrono_tz::Tz,
    #[serde(default)]
    pub display: CalendarSettings,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `.env` file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        Ok(Config::builder()
            .set_default("logging.level", "debug")?
            .set_default("calendar.default_timezone", DEFAULT_TIMEZONE)?
            // Env file
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("_")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let settings = load_config().expect("defaults should deserialize");
        assert_eq!(settings.calendar.default_timezone, chrono_tz::Tz::UTC);
        assert!(!settings.logging.level.is_empty());
    }
}
