//! Configuration management for casegate.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use casegate_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("casegate.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use casegate_domain::RuleCacheConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `CASEGATE_CACHE__TTL_SECS`.
pub const ENV_PREFIX: &str = "CASEGATE";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Rule cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Rule listing settings
    #[serde(default)]
    pub pagination: PaginationSettings,
}

/// Type-scoped rule cache settings.
///
/// ```yaml
/// cache:
///   ttl_secs: 600
///   max_capacity: 16
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Absolute lifetime of the cached rule set.
    /// Environment variable: `CASEGATE_CACHE__TTL_SECS`
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Capacity of the in-process cache backend.
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> RuleCacheConfig {
        RuleCacheConfig::default()
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .with_max_capacity(self.max_capacity)
    }
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_cache_capacity() -> u64 {
    16
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Page size limits for rule listing.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PaginationSettings {
    /// Page size used when a request does not ask for one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound on requested page sizes.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_max_page_size() -> u32 {
    1000
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `CASEGATE_` and use `__` as separator.
    /// For example:
    /// - `CASEGATE_CACHE__TTL_SECS=60` overrides `cache.ttl_secs`
    /// - `CASEGATE_LOGGING__JSON=true` overrides `logging.json`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(env_source())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs must be greater than 0"));
        }
        if self.cache.max_capacity == 0 {
            return Err(invalid("cache.max_capacity must be greater than 0"));
        }

        let paging = &self.pagination;
        if paging.default_page_size == 0 || paging.max_page_size == 0 {
            return Err(invalid("pagination page sizes must be greater than 0"));
        }
        if paging.default_page_size > paging.max_page_size {
            return Err(invalid(format!(
                "pagination.default_page_size ({}) exceeds pagination.max_page_size ({})",
                paging.default_page_size, paging.max_page_size
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

fn env_source() -> Environment {
    // Use __ as separator for nested keys: CASEGATE_CACHE__TTL_SECS -> cache.ttl_secs
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn invalid(message: impl Into<String>) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        message: message.into(),
    }
}
