//! Service Configuration Module
//!
//! Provides configuration loading for the price buffer service.
//! Supports loading from TOML files with environment-specific overrides.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Main service configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferServiceConfig {
    /// Seconds between periodic flushes of the price buffer
    pub flush_interval_secs: u64,

    /// Tracing filter directive (`info`, `price_buffer=debug,warn`, ...)
    pub log_level: String,

    pub log_format: LogFormat,

    /// Update feed to ingest: a file path, or `-`/unset for stdin.
    /// `${VAR}` references are expanded.
    pub input: Option<String>,
}

impl Default for BufferServiceConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: defaults::FLUSH_INTERVAL_SECS,
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: LogFormat::Pretty,
            input: None,
        }
    }
}

impl BufferServiceConfig {
    /// Load configuration from files with environment overrides
    ///
    /// An explicit `base_path` must exist; the default path is optional so the
    /// service can start on defaults alone. The environment overlay is looked up
    /// in an `environments/` directory next to the base file.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let (base, required) = match base_path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(defaults::CONFIG_PATH), false),
        };

        let defaults_source = Config::try_from(&Self::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = Config::builder()
            .add_source(defaults_source)
            .add_source(File::from(base.as_path()).required(required));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .map(|dir| dir.join("environments"))
                .unwrap_or_else(|| PathBuf::from(defaults::ENVIRONMENTS_DIR))
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (PRICE_BUFFER_ prefix)
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!("Configuration resolved: {:?}", config);
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_secs < defaults::MIN_FLUSH_INTERVAL_SECS {
            bail!(
                "flush_interval_secs must be at least {} (got {})",
                defaults::MIN_FLUSH_INTERVAL_SECS,
                self.flush_interval_secs
            );
        }
        if self.log_level.trim().is_empty() {
            bail!("log_level must not be empty");
        }
        Ok(())
    }

    /// Expand environment variables in string values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        if let Some(input) = &self.input {
            let expanded = shellexpand::env(input).context("Failed to expand input path")?;
            self.input = Some(expanded.to_string());
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Convenience function: load, expand and validate
pub fn load_config(
    base_path: Option<&Path>,
    environment: Option<&str>,
) -> Result<BufferServiceConfig> {
    let mut config = BufferServiceConfig::load(base_path, environment)?;
    config.expand_env_vars()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_base_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("price_buffer.toml");

        let config_content = r#"
flush_interval_secs = 15
log_format = "json"
input = "/var/feed/prices.ndjson"
"#;

        fs::write(&config_path, config_content).unwrap();

        let config = BufferServiceConfig::load(Some(&config_path), None).unwrap();

        assert_eq!(config.flush_interval_secs, 15);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.input.as_deref(), Some("/var/feed/prices.ndjson"));
        assert_eq!(config.flush_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(BufferServiceConfig::load(Some(&missing), None).is_err());
    }

    #[test]
    fn test_environment_overlay() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("price_buffer.toml");
        fs::write(&config_path, "flush_interval_secs = 30\n").unwrap();

        let env_dir = dir.path().join("environments");
        fs::create_dir(&env_dir).unwrap();
        fs::write(env_dir.join("staging.toml"), "flush_interval_secs = 10\n").unwrap();

        let config = BufferServiceConfig::load(Some(&config_path), Some("staging")).unwrap();
        assert_eq!(config.flush_interval_secs, 10);

        // Unknown environment falls back to the base file
        let config = BufferServiceConfig::load(Some(&config_path), Some("nowhere")).unwrap();
        assert_eq!(config.flush_interval_secs, 30);
    }

    #[test]
    fn test_environment_variable_override() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("price_buffer.toml");
        fs::write(&config_path, "log_level = \"warn\"\n").unwrap();

        std::env::set_var("PRICE_BUFFER_LOG_LEVEL", "debug");
        let config = BufferServiceConfig::load(Some(&config_path), None);
        std::env::remove_var("PRICE_BUFFER_LOG_LEVEL");

        assert_eq!(config.unwrap().log_level, "debug");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = BufferServiceConfig {
            flush_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(BufferServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_expand_env_vars_in_input() {
        std::env::set_var("BUFFER_TEST_FEED_DIR", "/data/feeds");
        let mut config = BufferServiceConfig {
            input: Some("${BUFFER_TEST_FEED_DIR}/eu.ndjson".to_string()),
            ..Default::default()
        };
        config.expand_env_vars().unwrap();
        assert_eq!(config.input.as_deref(), Some("/data/feeds/eu.ndjson"));
    }
}
