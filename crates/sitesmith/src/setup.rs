//! Construction of the pipeline from a [`SitesmithConfig`].

use std::sync::Arc;

use sitesmith_chat::{CompletionClient, OpenAiClient, ResponseAssembler};
use sitesmith_config::SitesmithConfig;
use sitesmith_networking::{
    client_with_middleware, default_client,
    retry_policies::{default_retry_policy, DoNotRetryPolicy},
};
use sitesmith_upload::{BatchLimits, DeduplicatingUploader, HttpBlockStore};

use crate::session::Session;

/// An error that occurs while building the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The environment variable that should hold the API key is not set.
    #[error("the environment variable {0} that holds the API key is not set")]
    MissingApiKey(String),

    /// The HTTP client could not be constructed.
    #[error("failed to construct the HTTP client")]
    Client(#[from] reqwest::Error),
}

/// Reads the API key from the environment variable named by the configuration.
pub fn api_key_from_env(config: &SitesmithConfig) -> Result<String, SetupError> {
    std::env::var(&config.model.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| SetupError::MissingApiKey(config.model.api_key_env.clone()))
}

/// Builds the client of the chat completions endpoint. Requests that fail transiently are
/// retried.
pub fn completion_client(
    config: &SitesmithConfig,
    api_key: impl Into<String>,
) -> Result<OpenAiClient, SetupError> {
    let client = client_with_middleware(
        default_client()?,
        Some(default_retry_policy()),
        Some(api_key.into()),
    );
    Ok(OpenAiClient::new(
        client,
        config.model.api_url.clone(),
        config.model.model.clone(),
    ))
}

/// Builds the store that probes the gateway and writes to the store endpoint.
///
/// The middleware does not retry: failed probes are repeated by the store itself with its own
/// timeout, and writes are not idempotent from the point of view of the caller.
pub fn block_store(config: &SitesmithConfig) -> Result<HttpBlockStore, SetupError> {
    let client = client_with_middleware(default_client()?, None::<DoNotRetryPolicy>, None);
    Ok(HttpBlockStore::new(
        client,
        config.gateway.url.clone(),
        config.gateway.store_endpoint.clone(),
    )
    .with_probe_timeout(config.probe.timeout())
    .with_probe_attempts(config.probe.retries))
}

/// Builds the uploader on top of `store`.
pub fn uploader(config: &SitesmithConfig, store: Arc<HttpBlockStore>) -> DeduplicatingUploader {
    DeduplicatingUploader::new(store)
        .with_batch_limits(BatchLimits {
            max_items: config.upload.max_batch_items,
            max_bytes: config.upload.max_batch_bytes,
        })
        .with_probe_concurrency(config.concurrency.probes)
        .with_probe_throttle(config.probe.throttle())
}

/// Starts a conversation with the configured system prompt and summary directive.
pub fn session(config: &SitesmithConfig, client: Arc<dyn CompletionClient>) -> Session {
    let assembler = ResponseAssembler::new(client, config.model.summary_directive.clone());
    Session::new(assembler, Some(config.model.system_prompt.clone()))
        .with_generation_concurrency(config.concurrency.generations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        let mut config = SitesmithConfig::default();
        config.model.api_key_env = "SITESMITH_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        insta::assert_snapshot!(
            api_key_from_env(&config).unwrap_err(),
            @"the environment variable SITESMITH_TEST_KEY_THAT_IS_NEVER_SET that holds the API key is not set"
        );
    }

    #[test]
    fn test_block_store_from_config() {
        let mut config = SitesmithConfig::default();
        config.gateway.url = "https://gateway.example.com/base".parse().unwrap();
        let store = block_store(&config).unwrap();
        let cid = "bafkreifzjut3te2nhyekklss27nh3k72ysco7y32koao5eei66wof36n5e"
            .parse()
            .unwrap();
        assert_eq!(
            store.probe_url(&cid).unwrap().as_str(),
            "https://gateway.example.com/base/ipfs/bafkreifzjut3te2nhyekklss27nh3k72ysco7y32koao5eei66wof36n5e"
        );
    }

    #[test]
    fn test_session_starts_with_system_prompt() {
        let config = SitesmithConfig::default();
        let client = completion_client(&config, "sk-test").unwrap();
        let session = session(&config, Arc::new(client));
        let history = session.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], sitesmith_chat::Message::system(config.model.system_prompt));
        assert!(session.store().is_ready());
    }
}
