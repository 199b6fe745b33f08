//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Posts returned per page by `GET /posts`
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_page_size() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            page_size: default_page_size(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Token and password settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for access tokens; required
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: u64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_token_ttl() -> u64 {
    48
}

fn default_bcrypt_cost() -> u32 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("postwire").join("postwire.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./postwire_data/postwire.db".to_string())
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from the first default location that exists, or from the
    /// environment alone. Also returns the file used, if any.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_default() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_first(&default_config_paths())
    }

    fn load_first(candidates: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match candidates.iter().find(|path| path.exists()) {
            Some(path) => Ok((Self::load_with_env(path)?, Some(path.clone()))),
            None => Ok((Self::from_env()?, None)),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("POSTWIRE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("POSTWIRE_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("POSTWIRE_PORT is not a valid port: {:?}", port))
            })?;
        }

        if let Some(secret) = var("POSTWIRE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(path) = var("POSTWIRE_DATABASE_PATH") {
            self.database.path = path;
        }

        if let Some(level) = var("POSTWIRE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("POSTWIRE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host is required".to_string()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port is required".to_string()));
        }
        if self.server.page_size == 0 {
            return Err(ConfigError::Invalid(
                "server.page_size must be greater than 0".to_string(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret is required".to_string()));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::Invalid(
                "auth.bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path is required".to_string()));
        }
        if self.hub.control_capacity == 0
            || self.hub.session_queue_capacity == 0
            || self.hub.max_sessions == 0
        {
            return Err(ConfigError::Invalid(
                "hub capacities must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|p| p.join("postwire").join("config.toml")),
        Some(PathBuf::from("/etc/postwire/config.toml")),
        Some(PathBuf::from("./config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Postwire Configuration
#
# Environment variables override these settings:
# - POSTWIRE_HOST
# - POSTWIRE_PORT
# - POSTWIRE_JWT_SECRET
# - POSTWIRE_DATABASE_PATH
# - POSTWIRE_LOG_LEVEL
# - POSTWIRE_LOG_FORMAT

[server]
# API server host
host = "0.0.0.0"

# API server port
port = 8090

# Posts per page for GET /api/v1/posts
page_size = 10

[auth]
# Secret used to sign access tokens (required)
jwt_secret = ""

# Token lifetime in hours
token_ttl_hours = 48

# bcrypt work factor (4-31)
bcrypt_cost = 10

[database]
# SQLite database file
path = "~/.local/share/postwire/postwire.db"

[hub]
# Pending control messages before producers wait
control_capacity = 256

# Pending events per client before it is disconnected as a slow consumer
session_queue_capacity = 64

# Maximum concurrent WebSocket clients
max_sessions = 10000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "secret".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.server.page_size, 10);
        assert_eq!(config.auth.token_ttl_hours, 48);
        assert_eq!(config.hub.session_queue_capacity, 64);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.hub.max_sessions, 10_000);
        assert_eq!(config.auth.bcrypt_cost, 10);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [hub]
            session_queue_capacity = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.hub.session_queue_capacity, 2);
        assert_eq!(config.hub.control_capacity, 256);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_validate_requires_secret() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacities() {
        let mut config = valid();
        config.hub.session_queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_default_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("config.toml");
        std::fs::write(&bad, "[server\nport = ").unwrap();

        let candidates = [dir.path().join("missing.toml"), bad];
        let result = Config::load_first(&candidates);

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_first_existing_default_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        std::fs::write(&first, "[server]\npage_size = 3\n").unwrap();
        std::fs::write(&second, "[server]\npage_size = 5\n").unwrap();

        let candidates = [dir.path().join("missing.toml"), first.clone(), second];
        let (config, source) = Config::load_first(&candidates).unwrap();

        assert_eq!(config.server.page_size, 3);
        assert_eq!(source, Some(first));
    }

    #[test]
    fn test_overrides_apply() {
        let vars = HashMap::from([
            ("POSTWIRE_PORT", "9000"),
            ("POSTWIRE_JWT_SECRET", "from-env"),
            ("POSTWIRE_LOG_FORMAT", "json"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_unparsable_port_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "POSTWIRE_PORT").then(|| "eighty".to_string())
        });

        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("POSTWIRE_PORT")));
        assert_eq!(config.server.port, 8090);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/postwire.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
