use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{merge_value, validate_http_url, Config, MergeError, ValidationError};

fn default_gateway_url() -> Url {
    Url::parse("https://ipfs.web4.near.page").expect("valid default url")
}

fn default_store_endpoint() -> Url {
    Url::parse("https://ipfs.web4.near.page/web4/contract/web4gpt.near/fs_store")
        .expect("valid default url")
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// The gateway used for existence checks, blocks are looked up at `{url}/ipfs/{cid}`.
    #[serde(default = "default_gateway_url")]
    pub url: Url,

    /// The endpoint that raw blocks are posted to.
    #[serde(default = "default_store_endpoint")]
    pub store_endpoint: Url,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            store_endpoint: default_store_endpoint(),
        }
    }
}

impl GatewayConfig {
    pub fn is_default(&self) -> bool {
        GatewayConfig::default() == *self
    }
}

impl Config for GatewayConfig {
    fn get_extension_name(&self) -> String {
        "gateway".to_string()
    }

    fn merge_config(self, other: &Self) -> Result<Self, MergeError> {
        let default = GatewayConfig::default();
        Ok(Self {
            url: merge_value(self.url, &other.url, &default.url),
            store_endpoint: merge_value(
                self.store_endpoint,
                &other.store_endpoint,
                &default.store_endpoint,
            ),
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_http_url("gateway.url", &self.url)?;
        validate_http_url("gateway.store-endpoint", &self.store_endpoint)
    }

    fn keys(&self) -> Vec<String> {
        vec!["url".to_string(), "store-endpoint".to_string()]
    }
}
