//! API server configuration.
//!
//! Loaded in three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. the TOML file named by `OPTICA_CONFIG` (if set)
//! 3. `OPTICA_*` environment variables
//!
//! Identifier templates are parsed here so a bad template stops the server
//! at startup instead of on the first registration.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use optica_core::identifier::{DEFAULT_CLIENT_TEMPLATE, DEFAULT_SALE_TEMPLATE};
use optica_core::{IdTemplate, IdTemplates, IdentifierError};
use optica_db::DbConfig;

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_VAR: &str = "OPTICA_CONFIG";

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Template for client registration numbers
    pub client_id_template: String,

    /// Template for sale reference numbers
    pub sale_id_template: String,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Events buffered per WebSocket subscriber before it starts lagging
    pub event_buffer: usize,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database_path: PathBuf::from("optica.db"),
            max_connections: 5,
            client_id_template: DEFAULT_CLIENT_TEMPLATE.to_string(),
            sale_id_template: DEFAULT_SALE_TEMPLATE.to_string(),
            log_filter: "info,optica_api=debug,optica_db=debug".to_string(),
            event_buffer: 256,
            busy_timeout_ms: 5_000,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => ApiConfig::default(),
        };
        let config = base.with_overrides(|key| env::var(key).ok())?;
        config.templates()?;
        Ok(config)
    }

    /// Reads a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `OPTICA_*` overrides supplied by `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("OPTICA_BIND_ADDR") {
            self.bind_addr = parse("OPTICA_BIND_ADDR", &value)?;
        }
        if let Some(value) = lookup("OPTICA_DATABASE_PATH") {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("OPTICA_MAX_CONNECTIONS") {
            self.max_connections = parse("OPTICA_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = lookup("OPTICA_CLIENT_ID_TEMPLATE") {
            self.client_id_template = value;
        }
        if let Some(value) = lookup("OPTICA_SALE_ID_TEMPLATE") {
            self.sale_id_template = value;
        }
        if let Some(value) = lookup("OPTICA_LOG_FILTER") {
            self.log_filter = value;
        }
        if let Some(value) = lookup("OPTICA_EVENT_BUFFER") {
            self.event_buffer = parse("OPTICA_EVENT_BUFFER", &value)?;
        }
        if let Some(value) = lookup("OPTICA_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = parse("OPTICA_BUSY_TIMEOUT_MS", &value)?;
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidValue("event_buffer".to_string()));
        }
        Ok(self)
    }

    /// Parses both identifier templates.
    pub fn templates(&self) -> Result<IdTemplates, ConfigError> {
        let client: IdTemplate = self.client_id_template.parse()?;
        let sale: IdTemplate = self.sale_id_template.parse()?;
        Ok(IdTemplates::new(client, sale)?)
    }

    /// Database settings derived from this config.
    pub fn db_config(&self) -> Result<DbConfig, ConfigError> {
        Ok(DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .templates(self.templates()?))
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Cannot read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Template(#[from] IdentifierError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.client_id_template, "M/{year}/{month}/{seq}");
        assert!(config.templates().is_ok());
    }

    #[test]
    fn test_toml_keeps_missing_defaults() {
        let config = ApiConfig::from_toml(
            r#"
            database_path = "/var/lib/optica/shop.db"
            sale_id_template = "S-{year}{month}-{seq:4}"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/optica/shop.db"));
        assert_eq!(config.sale_id_template, "S-{year}{month}-{seq:4}");
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_connections = 8\nlog_filter = \"warn\"").unwrap();

        let config = ApiConfig::from_file(file.path())
            .unwrap()
            .with_overrides(env_of(&[
                ("OPTICA_MAX_CONNECTIONS", "2"),
                ("OPTICA_BIND_ADDR", "0.0.0.0:9000"),
            ]))
            .unwrap();

        assert_eq!(config.max_connections, 2);
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_invalid_values() {
        let err = ApiConfig::default()
            .with_overrides(env_of(&[("OPTICA_MAX_CONNECTIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "OPTICA_MAX_CONNECTIONS"));

        let err = ApiConfig::default()
            .with_overrides(env_of(&[("OPTICA_EVENT_BUFFER", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        assert!(matches!(
            ApiConfig::from_toml("max_connections = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_templates_validated() {
        let config = ApiConfig::default()
            .with_overrides(env_of(&[("OPTICA_CLIENT_ID_TEMPLATE", "M/{year}/{month}")]))
            .unwrap();
        assert!(matches!(config.templates(), Err(ConfigError::Template(_))));

        let config = ApiConfig {
            sale_id_template: DEFAULT_CLIENT_TEMPLATE.to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(config.templates(), Err(ConfigError::Template(_))));
    }

    #[test]
    fn test_templates_with_shared_prefix_rejected() {
        let config = ApiConfig::default()
            .with_overrides(env_of(&[("OPTICA_SALE_ID_TEMPLATE", "M/{year}/{month}/{seq:3}")]))
            .unwrap();
        assert!(matches!(config.templates(), Err(ConfigError::Template(_))));
        assert!(config.db_config().is_err());
    }
}
