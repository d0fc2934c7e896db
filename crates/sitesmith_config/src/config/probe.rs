use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{merge_value, validate_non_zero, Config, MergeError, ValidationError};

fn default_timeout_ms() -> u64 {
    2500
}

fn default_retries() -> u32 {
    3
}

fn default_throttle_ms() -> u64 {
    25
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ProbeConfig {
    /// How long a single existence check may take, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How many attempts are made before an existence check fails.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// The delay between starting two successive existence checks, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn is_default(&self) -> bool {
        ProbeConfig::default() == *self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Config for ProbeConfig {
    fn get_extension_name(&self) -> String {
        "probe".to_string()
    }

    fn merge_config(self, other: &Self) -> Result<Self, MergeError> {
        let default = ProbeConfig::default();
        Ok(Self {
            timeout_ms: merge_value(self.timeout_ms, &other.timeout_ms, &default.timeout_ms),
            retries: merge_value(self.retries, &other.retries, &default.retries),
            throttle_ms: merge_value(self.throttle_ms, &other.throttle_ms, &default.throttle_ms),
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_non_zero("probe.timeout-ms", self.timeout_ms)?;
        validate_non_zero("probe.retries", u64::from(self.retries))
    }

    fn keys(&self) -> Vec<String> {
        vec![
            "timeout-ms".to_string(),
            "retries".to_string(),
            "throttle-ms".to_string(),
        ]
    }
}
