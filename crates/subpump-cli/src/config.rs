use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use subpump::LocatorConfig;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Shape of the emulated hosted page.
#[derive(Debug, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub flavor: Flavor,
    /// Registry ids published for the legacy flavor; the first one is the
    /// instance that receives replayed frames.
    #[serde(default = "default_instances")]
    pub instances: Vec<String>,
    /// Delay before the client appears on the page, in milliseconds.
    #[serde(default)]
    pub publish_delay_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            flavor: Flavor::default(),
            instances: default_instances(),
            publish_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    #[default]
    Modern,
    Legacy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_instances() -> Vec<String> {
    vec!["primary".to_string()]
}

/// Load configuration from a YAML file.
///
/// A missing file yields the defaults and a warning.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}
