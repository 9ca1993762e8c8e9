//! MailRelay Configuration
//!
//! Loads the relay configuration from a TOML file and overlays values from
//! the environment. Configuration is read once at startup and never mutated.
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `MR_PRIMARY_URL` | Primary provider send URL |
//! | `MR_PRIMARY_API_KEY` | Primary provider API key |
//! | `MR_SECONDARY_URL` | Secondary provider send URL |
//! | `MR_SECONDARY_API_KEY` | Secondary provider API key |
//! | `MR_DATABASE_TYPE` | `memory`, `sqlite` or `postgres` |
//! | `MR_DATABASE_URL` | Database connection URL |
//! | `MR_BIND_ADDR` | HTTP listen address |

use std::path::Path;
use std::time::Duration;

use mr_common::ProviderKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for one delivery provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name recorded with each sent message
    pub name: String,
    pub kind: ProviderKind,
    pub url: String,
    #[serde(default = "default_request_method")]
    pub request_method: String,
    /// Overrides the content type produced by the wire format
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub accept_type: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_request_method() -> String { "POST".to_string() }
fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_connect_timeout_ms() -> u64 { 3_000 }

impl ProviderConfig {
    pub fn sendgrid(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: "SendGrid".to_string(),
            kind: ProviderKind::SendGrid,
            url: url.into(),
            request_method: default_request_method(),
            content_type: None,
            accept_type: Some("application/json".to_string()),
            api_key: api_key.into(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    pub fn mailgun(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: "MailGun".to_string(),
            kind: ProviderKind::MailGun,
            url: url.into(),
            request_method: default_request_method(),
            content_type: None,
            accept_type: None,
            api_key: api_key.into(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn validate(&self, label: &str) -> Result<()> {
        let has_host = match url::Url::parse(&self.url) {
            Ok(url) => {
                matches!(url.scheme(), "http" | "https")
                    && url.host_str().is_some_and(|host| !host.is_empty())
            }
            Err(_) => false,
        };
        if !has_host {
            return Err(ConfigError::Invalid(format!(
                "{} provider url must be an absolute http(s) url, got '{}'",
                label, self.url
            )));
        }
        if http::Method::from_bytes(self.request_method.as_bytes()).is_err() {
            return Err(ConfigError::Invalid(format!(
                "{} provider request_method '{}' is not a valid HTTP method",
                label, self.request_method
            )));
        }
        if self.content_type.as_deref().is_some_and(|ct| ct.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{} provider content_type is empty", label)));
        }
        Ok(())
    }
}

/// Liveness probe timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_probe_timeout_ms() -> u64 { 3_000 }

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_probe_timeout_ms(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthCheckConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory`, `sqlite` or `postgres`
    #[serde(default = "default_db_type")]
    pub db_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_type() -> String { "memory".to_string() }
fn default_max_connections() -> u32 { 5 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String { "0.0.0.0:8080".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

/// Top-level relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    pub primary: ProviderConfig,
    pub secondary: ProviderConfig,
}

impl RelayConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RelayConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from a TOML file, overlay the process environment and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        info!(
            path = %path.display(),
            primary = %config.primary.name,
            secondary = %config.secondary.name,
            db_type = %config.database.db_type,
            "Relay configuration loaded"
        );
        Ok(config)
    }

    /// Overlay values from a key lookup (normally the environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key) {
                debug!(key, "Applying configuration override");
                *target = value;
            }
        };

        set("MR_PRIMARY_URL", &mut self.primary.url);
        set("MR_PRIMARY_API_KEY", &mut self.primary.api_key);
        set("MR_SECONDARY_URL", &mut self.secondary.url);
        set("MR_SECONDARY_API_KEY", &mut self.secondary.api_key);
        set("MR_DATABASE_TYPE", &mut self.database.db_type);
        set("MR_BIND_ADDR", &mut self.server.bind_addr);

        if let Some(url) = lookup("MR_DATABASE_URL") {
            self.database.url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.primary.validate("primary")?;
        self.secondary.validate("secondary")?;

        match self.database.db_type.as_str() {
            "memory" => {}
            "sqlite" | "postgres" => {
                if self.database.url.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid(format!(
                        "database url is required for {}",
                        self.database.db_type
                    )));
                }
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown database type: {}. Use memory, sqlite, or postgres",
                    other
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [server]
        bind_addr = "127.0.0.1:9000"

        [database]
        db_type = "memory"

        [primary]
        name = "SendGrid"
        kind = "sendgrid"
        url = "https://api.sendgrid.com/v3/mail/send"
        accept_type = "application/json"
        api_key = "sg-key"

        [secondary]
        name = "MailGun"
        kind = "mailgun"
        url = "https://api.mailgun.net/v3/example.org/messages"
        content_type = "application/x-www-form-urlencoded"
        api_key = "mg-key"
        request_timeout_ms = 5000
    "#;

    #[test]
    fn test_parse_sample() {
        let config = RelayConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.primary.kind, ProviderKind::SendGrid);
        assert_eq!(config.primary.request_method, "POST");
        assert_eq!(config.primary.connect_timeout(), Duration::from_millis(3000));
        assert_eq!(config.secondary.kind, ProviderKind::MailGun);
        assert_eq!(config.secondary.accept_type, None);
        assert_eq!(config.primary.content_type, None);
        assert_eq!(config.secondary.content_type.as_deref(), Some("application/x-www-form-urlencoded"));
        assert_eq!(config.secondary.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.health_check, HealthCheckConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            ("MR_PRIMARY_API_KEY", "from-env"),
            ("MR_DATABASE_TYPE", "postgres"),
            ("MR_DATABASE_URL", "postgres://localhost/mail"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.primary.api_key, "from-env");
        assert_eq!(config.secondary.api_key, "mg-key");
        assert_eq!(config.database.db_type, "postgres");
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/mail"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_relative_url() {
        let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
        config.secondary.url = "api.mailgun.net".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_unparseable_url() {
        for url in ["http://api sendgrid com/v3", "https://", "ftp://api.sendgrid.com/v3"] {
            let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
            config.primary.url = url.to_string();
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "accepted {url}");
        }
    }

    #[test]
    fn test_rejects_invalid_request_method() {
        for method in ["", "PO ST", "GET\n"] {
            let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
            config.secondary.request_method = method.to_string();
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "accepted {method:?}");
        }

        let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
        config.secondary.request_method = "PUT".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_database_is_memory() {
        let database = DatabaseConfig::default();
        assert_eq!(database.db_type, "memory");
        assert_eq!(database.url, None);

        let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
        config.database = database;
        assert!(config.validate().is_ok());

        let without_section = SAMPLE.replace("[database]\n        db_type = \"memory\"", "");
        assert!(!without_section.contains("[database]"));
        let config = RelayConfig::from_toml_str(&without_section).unwrap();
        assert_eq!(config.database.db_type, "memory");
    }

    #[test]
    fn test_rejects_unknown_database() {
        let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
        config.database.db_type = "mongo".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = RelayConfig::from_toml_str(SAMPLE).unwrap();
        config.database.db_type = "postgres".to_string();
        config.database.url = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.primary.name, "SendGrid");
    }

    #[test]
    fn test_load_missing_file() {
        let result = RelayConfig::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
