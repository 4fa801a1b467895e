//! Configuration loading using Figment
//!
//! Configuration is merged from, lowest priority first:
//! 1. built-in defaults
//! 2. a TOML file (`batcon.toml` unless another path is given)
//! 3. environment variables prefixed with `BATCON_`, nested keys split on `__`
//!
//! The resulting [`BatconConfig`] is passed explicitly to whatever needs it;
//! nothing reads configuration from global state.
//!
//! # Example
//! ```no_run
//! use batcon::config::BatconConfig;
//!
//! let config = BatconConfig::load()?;
//! println!("Team: {}", config.test.team_id);
//! # Ok::<(), batcon::BatconError>(())
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{BatconError, Result};
use crate::logging::{parse_log_level, OutputFormat, TracingConfig};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "batcon.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatconConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Test defaults
    #[serde(default)]
    pub test: TestConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Defaults for a capacity test; CLI flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Team number written to the header
    #[serde(default = "default_team_id")]
    pub team_id: u32,
    /// Delay between samples
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u32,
    /// Stop voltage in millivolts
    #[serde(default = "default_min_volts")]
    pub min_volts_milli: u32,
    /// Voltage drop in millivolts required to log a reading
    #[serde(default = "default_log_volts")]
    pub log_volts_milli: u32,
    /// Where the binary log is written.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_team_id() -> u32 {
    1076
}

fn default_poll_interval() -> u32 {
    100
}

fn default_min_volts() -> u32 {
    10_500
}

fn default_log_volts() -> u32 {
    50
}

fn default_output() -> PathBuf {
    PathBuf::from("history.bclog")
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            team_id: default_team_id(),
            poll_interval_ms: default_poll_interval(),
            min_volts_milli: default_min_volts(),
            log_volts_milli: default_log_volts(),
            output: default_output(),
        }
    }
}

impl BatconConfig {
    /// Load from `batcon.toml` (if present) and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file path. A missing file falls back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Provider chain used by [`load_from`](Self::load_from).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BATCON_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        parse_log_level(&self.application.log_level).map_err(BatconError::Validation)?;
        self.application
            .log_format
            .parse::<OutputFormat>()
            .map_err(BatconError::Validation)?;

        if u16::try_from(self.test.team_id).is_err() {
            return Err(BatconError::Validation(format!(
                "Invalid team_id {}. Must fit in 16 bits",
                self.test.team_id
            )));
        }

        if self.test.poll_interval_ms == 0 {
            return Err(BatconError::Validation(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Tracing settings derived from the application section.
    pub fn tracing(&self) -> Result<TracingConfig> {
        TracingConfig::from_config(self).map_err(BatconError::Validation)
    }
}
