//! Gateway configuration loaded from the environment.

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

/// Startup configuration error. Fatal: the process exits non-zero.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    /// An environment variable holds an unusable value.
    #[error("invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address (e.g. `0.0.0.0:8080`).
    pub listen_addr: String,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Request timeout in seconds (response headers, not stream bodies).
    pub request_timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

impl GatewayConfig {
    /// Build from the environment, honoring `PORT` (default 8080).
    #[must_use]
    pub fn from_env() -> Self {
        let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        Self {
            listen_addr: format!("0.0.0.0:{port}"),
            ..Self::default()
        }
    }
}

/// Postgres connection settings read from `DB_*` variables.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database host (`DB_HOST`, default `localhost`).
    pub host: String,
    /// Database port (`DB_PORT`, default `5432`).
    pub port: u16,
    /// Database user (`DB_USER`, default `postgres`).
    pub user: String,
    /// Database password (`DB_PASSWORD`, required).
    pub password: String,
    /// Database name (`DB_NAME`, default `loadtest`).
    pub name: String,
    /// SSL mode (`DB_SSLMODE`, default `disable`).
    pub sslmode: String,
}

impl DbConfig {
    /// Read the `DB_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error when `DB_PASSWORD` is missing or `DB_PORT` is not
    /// a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let password =
            std::env::var("DB_PASSWORD").map_err(|_| ConfigError::MissingVar("DB_PASSWORD"))?;

        let port = env_or("DB_PORT", "5432");
        let port = port
            .parse()
            .map_err(|_| ConfigError::InvalidVar("DB_PORT", port.clone()))?;

        Ok(Self {
            host: env_or("DB_HOST", "localhost"),
            port,
            user: env_or("DB_USER", "postgres"),
            password,
            name: env_or("DB_NAME", "loadtest"),
            sslmode: env_or("DB_SSLMODE", "disable"),
        })
    }

    /// Build sqlx connect options from these settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the SSL mode string is not recognized.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        let ssl_mode: PgSslMode = self
            .sslmode
            .parse()
            .map_err(|_| ConfigError::InvalidVar("DB_SSLMODE", self.sslmode.clone()))?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(ssl_mode))
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.request_timeout_seconds, 30);
    }

    #[test]
    fn db_config_builds_connect_options() {
        let config = DbConfig {
            host: "db.internal".to_string(),
            port: 5433,
            user: "loadagg".to_string(),
            password: "p@ss:word/with#chars".to_string(),
            name: "loadtest".to_string(),
            sslmode: "require".to_string(),
        };
        assert!(config.connect_options().is_ok());
    }

    #[test]
    fn db_config_rejects_bad_sslmode() {
        let config = DbConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "pw".to_string(),
            name: "loadtest".to_string(),
            sslmode: "sometimes".to_string(),
        };
        assert!(matches!(
            config.connect_options(),
            Err(ConfigError::InvalidVar("DB_SSLMODE", _))
        ));
    }
}
