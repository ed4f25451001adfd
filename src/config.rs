//! Configuration management for the accounting core
//!
//! Provides configuration file support with TOML format, environment
//! variable overrides, and sensible defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountingConfig {
    /// Cache accounting configuration
    pub cache: CacheConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Cache accounting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Cache size budget in bytes; 0 disables eviction
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_max_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: default_log_level(),
        }
    }
}

impl AccountingConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse {}: {}", path, e)))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(max_bytes) = std::env::var("CHUNK_CACHE_MAX_BYTES") {
            if let Ok(b) = max_bytes.parse() {
                self.cache.max_bytes = b;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    ///
    /// `max_bytes == 0` is legal and disables the budget entirely.
    pub fn validate(&self) -> Result<()> {
        const KNOWN_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        if !KNOWN_LEVELS.contains(&self.monitoring.log_level.as_str()) {
            return Err(Error::Configuration(format!(
                "Unknown log level: {}",
                self.monitoring.log_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AccountingConfig::default();
        assert_eq!(config.cache.max_bytes, 512 * 1024 * 1024);
        assert!(config.monitoring.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_budget_is_legal() {
        let mut config = AccountingConfig::default();
        config.cache.max_bytes = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AccountingConfig::default();
        config.monitoring.log_level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let parsed: AccountingConfig = toml::from_str(
            r#"
            [cache]
            max_bytes = 1048576

            [monitoring]
            metrics_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(parsed.cache.max_bytes, 1_048_576);
        assert!(!parsed.monitoring.metrics_enabled);
        assert_eq!(parsed.monitoring.log_level, "info");
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("CHUNK_CACHE_MAX_BYTES", "4096");
        let config = AccountingConfig::from_env();
        assert_eq!(config.cache.max_bytes, 4096);
        std::env::remove_var("CHUNK_CACHE_MAX_BYTES");
    }
}
