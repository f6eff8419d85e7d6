//! TOML-based service configuration.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Top-level service configuration parsed from TOML.
///
/// All fields have defaults; an absent file means "run with defaults". Load
/// from TOML with [`ServiceConfig::from_toml_file`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP listener parameters.
    pub server: ServerConfig,
    /// Tick driver cadence and timeout.
    pub tick: TickConfig,
    /// On-disk persistence locations.
    pub storage: StorageConfig,
    /// Authentication parameters and bootstrap credentials.
    pub auth: AuthConfig,
}

/// HTTP listener parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    pub bind: String,
    /// Listener port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Tick driver parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickConfig {
    /// Whether the driver runs at all.
    pub enabled: bool,
    /// Wall-clock seconds between ticks (must be > 0).
    pub interval_secs: u64,
    /// Per-tick store-update timeout in seconds (must be > 0).
    pub timeout_secs: u64,
    /// Seed for the wind-jitter RNG.
    pub seed: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            seed: 42,
        }
    }
}

/// On-disk persistence locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the snapshot and the history log (must be non-empty).
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

/// Authentication parameters and bootstrap credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Bearer-token lifetime in hours (must be > 0).
    pub token_ttl_hours: i64,
    /// Password for the provisioned `admin` account.
    pub admin_password: String,
    /// Password for the provisioned `guest` account.
    pub guest_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: 24,
            admin_password: "admin123".to_string(),
            guest_password: "guest123".to_string(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"tick.interval_secs"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} - {}", self.field, self.message)
    }
}

impl ServiceConfig {
    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("error: cannot read config file {}: {e}", path.display()))?;
        toml::from_str(&raw)
            .map_err(|e| format!("error: cannot parse config file {}: {e}", path.display()))
    }

    /// Validates field constraints, returning every violation.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.tick.interval_secs == 0 {
            errors.push(ConfigError {
                field: "tick.interval_secs".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        if self.tick.timeout_secs == 0 {
            errors.push(ConfigError {
                field: "tick.timeout_secs".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        if self.storage.data_dir.trim().is_empty() {
            errors.push(ConfigError {
                field: "storage.data_dir".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.auth.token_ttl_hours <= 0 {
            errors.push(ConfigError {
                field: "auth.token_ttl_hours".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        if self.auth.admin_password.is_empty() {
            errors.push(ConfigError {
                field: "auth.admin_password".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.tick.interval_secs, 30);
        assert_eq!(config.tick.timeout_secs, 5);
        assert_eq!(config.auth.token_ttl_hours, 24);
    }

    #[test]
    fn parses_partial_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [server]
            port = 8080

            [tick]
            interval_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.tick.interval_secs, 10);
        assert_eq!(config.tick.timeout_secs, 5);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<ServiceConfig, _> = toml::from_str(
            r#"
            [tick]
            cadence = 10
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn validate_reports_every_violation() {
        let mut config = ServiceConfig::default();
        config.tick.interval_secs = 0;
        config.tick.timeout_secs = 0;
        config.storage.data_dir = " ".to_string();
        config.auth.token_ttl_hours = 0;

        let errors = config.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "tick.interval_secs",
                "tick.timeout_secs",
                "storage.data_dir",
                "auth.token_ttl_hours",
            ]
        );
    }

    #[test]
    fn error_display_includes_field_path() {
        let err = ConfigError {
            field: "tick.interval_secs".to_string(),
            message: "must be > 0".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "config error: tick.interval_secs - must be > 0"
        );
    }
}
