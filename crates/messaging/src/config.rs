//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::error::MessagingError;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL URL; in-memory store when unset
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `COMMAND_TIMEOUT_MS`: how long a client waits for an outcome (default: `5000`)
/// - `ACK_TIMEOUT_MS`: how long a client waits for the listener's ack (default: `1000`)
/// - `DB_MAX_CONNECTIONS`: pool size (default: `5`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub command_timeout: Duration,
    pub ack_timeout: Duration,
    pub db_max_connections: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            command_timeout: millis("COMMAND_TIMEOUT_MS", defaults.command_timeout),
            ack_timeout: millis("ACK_TIMEOUT_MS", defaults.ack_timeout),
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.db_max_connections),
        }
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<(), MessagingError> {
        if self.command_timeout.is_zero() || self.ack_timeout.is_zero() {
            return Err(MessagingError::Config("timeouts must be positive".into()));
        }
        if self.db_max_connections == 0 {
            return Err(MessagingError::Config(
                "DB_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            command_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(1),
            db_max_connections: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.database_url, None);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.command_timeout, Duration::from_millis(5000));
        assert_eq!(config.ack_timeout, Duration::from_millis(1000));
        assert_eq!(config.db_max_connections, 5);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_map(&[]);
        assert_eq!(config.database_url, None);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("DATABASE_URL", "postgres://localhost/users"),
            ("RUST_LOG", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("COMMAND_TIMEOUT_MS", "250"),
            ("ACK_TIMEOUT_MS", "50"),
            ("DB_MAX_CONNECTIONS", "12"),
        ]);

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/users")
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.command_timeout, Duration::from_millis(250));
        assert_eq!(config.ack_timeout, Duration::from_millis(50));
        assert_eq!(config.db_max_connections, 12);
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        assert!(from_map(&[("ACK_TIMEOUT_MS", "0")]).validate().is_err());
        assert!(from_map(&[("DB_MAX_CONNECTIONS", "0")]).validate().is_err());
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = from_map(&[
            ("DATABASE_URL", ""),
            ("COMMAND_TIMEOUT_MS", "soon"),
            ("DB_MAX_CONNECTIONS", "-1"),
        ]);

        assert_eq!(config.database_url, None);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.db_max_connections, 5);
    }
}
