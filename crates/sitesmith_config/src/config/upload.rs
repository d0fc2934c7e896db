use serde::{Deserialize, Serialize};

use crate::config::{merge_value, validate_non_zero, Config, MergeError, ValidationError};

fn default_max_batch_items() -> usize {
    7
}

/// 256 KiB.
fn default_max_batch_bytes() -> usize {
    256 * 1024
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct UploadConfig {
    /// The maximum number of blocks in one upload batch.
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,

    /// The maximum cumulative size of the blocks in one upload batch, in bytes.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_batch_items: default_max_batch_items(),
            max_batch_bytes: default_max_batch_bytes(),
        }
    }
}

impl UploadConfig {
    pub fn is_default(&self) -> bool {
        UploadConfig::default() == *self
    }
}

impl Config for UploadConfig {
    fn get_extension_name(&self) -> String {
        "upload".to_string()
    }

    fn merge_config(self, other: &Self) -> Result<Self, MergeError> {
        let default = UploadConfig::default();
        Ok(Self {
            max_batch_items: merge_value(
                self.max_batch_items,
                &other.max_batch_items,
                &default.max_batch_items,
            ),
            max_batch_bytes: merge_value(
                self.max_batch_bytes,
                &other.max_batch_bytes,
                &default.max_batch_bytes,
            ),
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_non_zero("upload.max-batch-items", self.max_batch_items as u64)?;
        validate_non_zero("upload.max-batch-bytes", self.max_batch_bytes as u64)
    }

    fn keys(&self) -> Vec<String> {
        vec![
            "max-batch-items".to_string(),
            "max-batch-bytes".to_string(),
        ]
    }
}
