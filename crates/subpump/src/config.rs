use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`Subpump`](crate::Subpump).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubpumpConfig {
    #[serde(default)]
    pub locator: LocatorConfig,
}

/// Retry budget for client discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Retries after the initial probe before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between probes, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl LocatorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SubpumpConfig::default();
        assert_eq!(config.locator.max_attempts, 10);
        assert_eq!(config.locator.retry_delay(), Duration::from_millis(50));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SubpumpConfig =
            serde_json::from_str(r#"{"locator":{"max_attempts":3}}"#).unwrap();
        assert_eq!(config.locator.max_attempts, 3);
        assert_eq!(config.locator.retry_delay_ms, 50);

        let empty: SubpumpConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SubpumpConfig::default());
    }
}
