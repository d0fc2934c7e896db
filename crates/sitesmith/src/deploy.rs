//! The boundary to whatever makes a published root reachable under an account.

use async_trait::async_trait;

/// An error reported by a [`Deployer`].
#[derive(Debug, thiserror::Error)]
#[error("failed to deploy {static_url} to {account_id}")]
pub struct DeployError {
    /// The account that was deployed to.
    pub account_id: String,
    /// The URL that was deployed.
    pub static_url: String,
    /// What went wrong.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Points an account at a published tree.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Makes `account_id` serve the website at `static_url` (`ipfs://<root>`).
    async fn deploy(&self, account_id: &str, static_url: &str) -> Result<(), DeployError>;
}

/// A [`Deployer`] that only logs the URL. Useful when the account is updated by other means.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDeployer;

#[async_trait]
impl Deployer for LoggingDeployer {
    async fn deploy(&self, account_id: &str, static_url: &str) -> Result<(), DeployError> {
        tracing::info!("{account_id} can now serve {static_url}");
        Ok(())
    }
}
