//! Configuration loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Prefix of environment overrides, e.g. `CACHEWIRE__CACHE__SERVERS`
pub const ENV_PREFIX: &str = "CACHEWIRE";

/// Separator between key segments in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Loaded configuration: the raw key tree handed to the core, plus the
/// settings the binary itself consumes
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: config::Config,
    pub logging: LoggingConfig,
    /// Whether the configuration file existed
    pub file_found: bool,
}

impl Settings {
    /// Load a TOML file (optional) with environment overrides on top
    pub fn load(path: &str) -> Result<Self> {
        let file_found = Path::new(path).exists();

        let source = config::Config::builder()
            .add_source(
                config::File::new(path, config::FileFormat::Toml).required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        let logging = match source.get::<LoggingConfig>("logging") {
            Ok(logging) => logging,
            Err(config::ConfigError::NotFound(_)) => LoggingConfig::default(),
            Err(e) => return Err(e).context("Invalid [logging] section"),
        };

        Ok(Self {
            source,
            logging,
            file_found,
        })
    }
}
