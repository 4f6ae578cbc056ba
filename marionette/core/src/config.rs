//! Engine and driver configuration.
//!
//! Configuration merges three layers, lowest priority first: built-in
//! defaults, an optional TOML file, environment variables. A missing
//! file is not an error.
//!
//! Example configuration file:
//!
//! ```toml
//! [engine]
//! max_deferred = 256
//!
//! [engine.substitutions]
//! ":deg" = "°"
//!
//! [driver]
//! load_timeout_secs = 30
//! tick_interval_ms = 16
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Engine-level settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Text substitutions seeded before any directive arrives. Later
    /// substitution directives merge over these.
    pub substitutions: Vec<(String, String)>,

    /// Maximum messages held while a resource load suspends
    /// processing. Arrivals beyond the cap are dropped with a warning.
    pub max_deferred: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            substitutions: Vec::new(),
            max_deferred: 256,
        }
    }
}

impl EngineConfig {
    /// Seed one substitution.
    #[must_use]
    pub fn with_substitution(mut self, shorthand: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.substitutions.push((shorthand.into(), replacement.into()));
        self
    }

    /// Set the deferred-message cap.
    #[must_use]
    pub fn with_max_deferred(mut self, max_deferred: usize) -> Self {
        self.max_deferred = max_deferred;
        self
    }
}

/// Driver-level settings.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Per-resource load timeout in seconds (0 = no timeout).
    pub load_timeout_secs: u64,

    /// Animation frame interval in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            load_timeout_secs: 30,
            tick_interval_ms: 16,
        }
    }
}

impl DriverConfig {
    /// Set the resource load timeout.
    #[must_use]
    pub fn with_load_timeout_secs(mut self, secs: u64) -> Self {
        self.load_timeout_secs = secs;
        self
    }

    /// Set the animation frame interval.
    #[must_use]
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }
}

/// Combined configuration as loaded from disk and environment.
#[derive(Clone, Debug, Default)]
pub struct MarionetteConfig {
    /// Engine section.
    pub engine: EngineConfig,
    /// Driver section.
    pub driver: DriverConfig,
    /// File the settings came from, when one was read.
    pub config_file_path: Option<PathBuf>,
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Engine section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct EngineToml {
    /// Seed substitutions, shorthand to replacement
    substitutions: Option<BTreeMap<String, String>>,

    /// Deferred-message cap during load suspension
    max_deferred: Option<usize>,
}

/// Driver section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct DriverToml {
    /// Per-resource load timeout in seconds
    load_timeout_secs: Option<u64>,

    /// Animation frame interval in milliseconds
    tick_interval_ms: Option<u64>,
}

/// Full TOML configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MarionetteToml {
    engine: EngineToml,
    driver: DriverToml,
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/marionette/marionette.toml` or
/// `~/.config/marionette/marionette.toml` if `XDG_CONFIG_HOME` is not
/// set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("marionette").join("marionette.toml"))
}

/// Load configuration from the default path, the environment on top.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<MarionetteConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or
/// parsed. `None` skips the file layer entirely.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<MarionetteConfig, ConfigError> {
    let mut config = MarionetteConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: MarionetteToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut MarionetteConfig, toml: &MarionetteToml) {
    if let Some(ref substitutions) = toml.engine.substitutions {
        for (shorthand, replacement) in substitutions {
            config
                .engine
                .substitutions
                .push((shorthand.clone(), replacement.clone()));
        }
    }
    if let Some(max_deferred) = toml.engine.max_deferred {
        config.engine.max_deferred = max_deferred;
    }
    if let Some(timeout) = toml.driver.load_timeout_secs {
        config.driver.load_timeout_secs = timeout;
    }
    if let Some(interval) = toml.driver.tick_interval_ms {
        config.driver.tick_interval_ms = interval;
    }
}

/// Apply environment variable overrides
///
/// Environment variables:
/// - `MARIONETTE_MAX_DEFERRED`: deferred-message cap
/// - `MARIONETTE_LOAD_TIMEOUT_SECS`: resource load timeout in seconds
/// - `MARIONETTE_TICK_INTERVAL_MS`: frame interval in milliseconds
fn apply_env_config(config: &mut MarionetteConfig) {
    if let Some(max_deferred) = std::env::var("MARIONETTE_MAX_DEFERRED")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.engine.max_deferred = max_deferred;
    }
    if let Some(timeout) = std::env::var("MARIONETTE_LOAD_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.driver.load_timeout_secs = timeout;
    }
    if let Some(interval) = std::env::var("MARIONETTE_TICK_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.driver.tick_interval_ms = interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert!(config.substitutions.is_empty());
        assert_eq!(config.max_deferred, 256);
    }

    #[test]
    fn test_driver_config_default() {
        let config = DriverConfig::default();
        assert_eq!(config.load_timeout_secs, 30);
        assert_eq!(config.tick_interval_ms, 16);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config_from_path(Some(PathBuf::from("/nonexistent/marionette.toml")))
            .expect("missing file is not an error");
        assert_eq!(config.driver.load_timeout_secs, 30);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("marionette.toml");
        std::fs::write(
            &path,
            r#"
[engine]
max_deferred = 16

[engine.substitutions]
":deg" = "deg"

[driver]
load_timeout_secs = 5
"#,
        )
        .expect("write config");

        let config = load_config_from_path(Some(path.clone())).expect("load");
        assert_eq!(config.engine.max_deferred, 16);
        assert_eq!(
            config.engine.substitutions,
            vec![(":deg".to_owned(), "deg".to_owned())]
        );
        assert_eq!(config.driver.load_timeout_secs, 5);
        // tick interval untouched by the file
        assert_eq!(config.driver.tick_interval_ms, 16);
        assert_eq!(config.config_file_path, Some(path));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("marionette.toml");
        std::fs::write(&path, "load_timeout_secs = [nope").expect("write config");
        assert!(load_config_from_path(Some(path)).is_err());
    }
}
