//! Device Configuration Module
//!
//! Loads [`DeviceConfig`] from an optional TOML file with `PSP_` environment
//! overrides. Nested keys use a double underscore:
//! `PSP_DEVICE__MAX_REQUESTS=128` overrides `[device] max_requests`.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Main device configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub device: DeviceSettings,
    pub logging: LoggingSettings,
}

/// Engine limits and timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Live requests before new operations fail with `NO_MEM`
    pub max_requests: usize,
    pub progress_poll_us: u64,
    pub finalize_timeout_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            max_requests: defaults::MAX_REQUESTS,
            progress_poll_us: defaults::PROGRESS_POLL_US,
            finalize_timeout_ms: defaults::FINALIZE_TIMEOUT_MS,
        }
    }
}

impl DeviceSettings {
    pub fn progress_poll(&self) -> Duration {
        Duration::from_micros(self.progress_poll_us)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

impl DeviceConfig {
    /// Load configuration from an optional file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading device config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: DeviceConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!(?config, "device configuration loaded");
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DeviceConfig =
            toml::from_str(content).context("Failed to parse device configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize device configuration")
    }

    /// Reject settings the device cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.device.max_requests == 0 {
            bail!("device.max_requests must be at least 1");
        }
        if self.device.progress_poll_us == 0 {
            bail!("device.progress_poll_us must be non-zero");
        }
        if self.logging.level.trim().is_empty() {
            bail!("logging.level must not be empty");
        }
        Ok(())
    }
}
