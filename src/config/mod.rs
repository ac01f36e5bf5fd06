//! # Configuration
//!
//! Application settings read from environment variables, with defaults and
//! a builder for tests and embedding.
//!
//! | Variable                    | Default                            |
//! |-----------------------------|------------------------------------|
//! | `HOST`                      | `127.0.0.1`                        |
//! | `PORT`                      | `3000`                             |
//! | `BASE_URL`                  | `http://localhost:3000`            |
//! | `DATABASE_URL`              | `sqlite://data/links.db?mode=rwc`  |
//! | `ENVIRONMENT`               | `development`                      |
//! | `DEFAULT_TTL_MINUTES`       | `30`                               |
//! | `MAX_GENERATION_ATTEMPTS`   | `10`                               |
//! | `MAX_LOG_ENTRIES`           | `1000`                             |
//! | `GEOLOCATION_MODE`          | `disabled` (`fixed`, `coordinates`)|
//! | `GEOLOCATION_LABEL`         | `Unknown`                          |
//! | `GEOLOCATION_LATITUDE`      | `0.0`                              |
//! | `GEOLOCATION_LONGITUDE`     | `0.0`                              |
//! | `GEOLOCATION_TIMEOUT_SECS`  | `5`                                |

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Main application settings.
///
/// # Example
/// ```rust
/// use link_ledger::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.default_ttl_minutes, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,

    pub port: u16,

    /// Prefix used to build full short URLs
    pub base_url: String,

    pub database_url: String,

    pub environment: Environment,

    /// TTL applied when a create request omits one
    pub default_ttl_minutes: i64,

    /// Retry budget for random shortcode allocation
    pub max_generation_attempts: u32,

    /// Number of entries kept under the `appLogs` key
    pub max_log_entries: usize,

    pub geolocation: GeoConfig,
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        }
    }
}

// =====================================
// Geolocation Settings
// =====================================
/// Which location resolver enriches recorded clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeoMode {
    /// No resolver: clicks keep the "Unknown" location
    #[default]
    Disabled,
    /// Every click resolves to a fixed label
    Fixed,
    /// Every click resolves to the configured coordinates
    Coordinates,
}

impl From<String> for GeoMode {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "fixed" | "label" => GeoMode::Fixed,
            "coordinates" | "coords" => GeoMode::Coordinates,
            _ => GeoMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub mode: GeoMode,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Upper bound on a single resolution
    pub timeout_secs: u64,
}

impl GeoConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            mode: GeoMode::Disabled,
            label: "Unknown".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            timeout_secs: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            database_url: "sqlite://data/links.db?mode=rwc".to_string(),
            environment: Environment::Development,
            default_ttl_minutes: 30,
            max_generation_attempts: 10,
            max_log_entries: 1000,
            geolocation: GeoConfig::default(),
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to [`Config::default`] values.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] when the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let get_env = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        let config = Self {
            host: get_env("HOST", &defaults.host),
            port: parse_env("PORT", defaults.port),
            base_url: get_env("BASE_URL", &defaults.base_url),
            database_url: get_env("DATABASE_URL", &defaults.database_url),
            environment: get_env("ENVIRONMENT", "development").into(),
            default_ttl_minutes: parse_env("DEFAULT_TTL_MINUTES", defaults.default_ttl_minutes),
            max_generation_attempts: parse_env(
                "MAX_GENERATION_ATTEMPTS",
                defaults.max_generation_attempts,
            ),
            max_log_entries: parse_env("MAX_LOG_ENTRIES", defaults.max_log_entries),
            geolocation: GeoConfig {
                mode: get_env("GEOLOCATION_MODE", "disabled").into(),
                label: get_env("GEOLOCATION_LABEL", &defaults.geolocation.label),
                latitude: parse_env("GEOLOCATION_LATITUDE", defaults.geolocation.latitude),
                longitude: parse_env("GEOLOCATION_LONGITUDE", defaults.geolocation.longitude),
                timeout_secs: parse_env(
                    "GEOLOCATION_TIMEOUT_SECS",
                    defaults.geolocation.timeout_secs,
                ),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(AppError::Config("PORT cannot be 0".to_string()));
        }

        if !crate::utils::validate_ttl_minutes(self.default_ttl_minutes) {
            return Err(AppError::Config(
                "DEFAULT_TTL_MINUTES must be a positive integer".to_string(),
            ));
        }

        if self.max_generation_attempts == 0 {
            return Err(AppError::Config(
                "MAX_GENERATION_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.geolocation.timeout_secs == 0 {
            return Err(AppError::Config(
                "GEOLOCATION_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =====================================
// Builder Pattern
// =====================================
/// Builder for [`Config`].
///
/// # Example
/// ```rust
/// use link_ledger::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .port(8080)
///     .default_ttl_minutes(60)
///     .build();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = url.into();
        self
    }

    #[must_use]
    pub fn environment(mut self, env: Environment) -> Self {
        self.config.environment = env;
        self
    }

    #[must_use]
    pub fn default_ttl_minutes(mut self, minutes: i64) -> Self {
        self.config.default_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn max_generation_attempts(mut self, attempts: u32) -> Self {
        self.config.max_generation_attempts = attempts;
        self
    }

    #[must_use]
    pub fn max_log_entries(mut self, entries: usize) -> Self {
        self.config.max_log_entries = entries;
        self
    }

    #[must_use]
    pub fn geolocation(mut self, geolocation: GeoConfig) -> Self {
        self.config.geolocation = geolocation;
        self
    }

    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }

    /// # Errors
    /// Returns [`AppError::Config`] if validation fails.
    pub fn build_validated(self) -> Result<Config> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

// =====================================
// Tests
// =====================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.default_ttl_minutes, 30);
        assert_eq!(config.max_generation_attempts, 10);
        assert_eq!(config.geolocation.mode, GeoMode::Disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .port(8080)
            .host("0.0.0.0")
            .default_ttl_minutes(5)
            .build();

        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.default_ttl_minutes, 5);
    }

    #[test]
    fn test_environment_from_string() {
        assert_eq!(Environment::from("PROD".to_string()), Environment::Production);
        assert_eq!(Environment::from("unknown".to_string()), Environment::Development);
    }

    #[test]
    fn test_geo_mode_from_string() {
        assert_eq!(GeoMode::from("fixed".to_string()), GeoMode::Fixed);
        assert_eq!(GeoMode::from("Coordinates".to_string()), GeoMode::Coordinates);
        assert_eq!(GeoMode::from("".to_string()), GeoMode::Disabled);
    }

    #[test]
    fn test_validation_rejects_non_positive_ttl() {
        let result = ConfigBuilder::new().default_ttl_minutes(0).build_validated();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let result = ConfigBuilder::new().max_generation_attempts(0).build_validated();
        assert!(result.is_err());
    }
}
