use serde::{Deserialize, Serialize};

use crate::config::{Config, MergeError, ValidationError};

/// The default maximum number of concurrent existence checks.
/// 50 is a reasonable default for the number of concurrent requests against one gateway.
fn default_max_concurrent_probes() -> usize {
    50
}

/// The default maximum number of files generated concurrently from a sitemap.
fn default_max_concurrent_generations() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ConcurrencyConfig {
    /// The maximum number of concurrent existence checks.
    // Needing to set this default next to the default of the full struct to avoid serde defaulting
    // to 0 of partial struct was omitted.
    #[serde(default = "default_max_concurrent_probes")]
    pub probes: usize,

    /// The maximum number of concurrent model round-trips when generating missing files.
    #[serde(default = "default_max_concurrent_generations")]
    pub generations: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            probes: default_max_concurrent_probes(),
            generations: default_max_concurrent_generations(),
        }
    }
}

impl ConcurrencyConfig {
    pub fn is_default(&self) -> bool {
        ConcurrencyConfig::default() == *self
    }
}

impl Config for ConcurrencyConfig {
    fn get_extension_name(&self) -> String {
        "concurrency".to_string()
    }

    fn merge_config(self, other: &Self) -> Result<Self, MergeError> {
        Ok(Self {
            probes: if other.probes == ConcurrencyConfig::default().probes {
                self.probes
            } else {
                other.probes
            },
            generations: if other.generations == ConcurrencyConfig::default().generations {
                self.generations
            } else {
                other.generations
            },
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.probes == 0 {
            return Err(ValidationError::InvalidValue(
                "concurrency.probes".to_string(),
                "The number of concurrent existence checks must be greater than 0".to_string(),
            ));
        }

        if self.generations == 0 {
            return Err(ValidationError::InvalidValue(
                "concurrency.generations".to_string(),
                "The number of concurrent generations must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        vec!["probes".to_string(), "generations".to_string()]
    }
}
