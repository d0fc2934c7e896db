//! Publishing of a set of files: address, upload what is missing, then deploy.

use sitesmith_artifacts::Artifact;
use sitesmith_cas::{address, AddressError, AddressedTree, Cid};
use sitesmith_upload::{DeduplicatingUploader, UploadError, UploadSummary};

use crate::deploy::{DeployError, Deployer};

/// The scheme of the URL handed to a [`Deployer`].
pub const STATIC_URL_SCHEME: &str = "ipfs://";

/// Returns the URL under which the tree with the given root is served.
pub fn static_url(root: &Cid) -> String {
    format!("{STATIC_URL_SCHEME}{root}")
}

/// An error that aborts a publish.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The sitemap lists files that do not exist yet.
    #[error("the website is not complete yet, missing: {}", pending.join(", "))]
    NotReady {
        /// The files that are listed but missing.
        pending: Vec<String>,
    },

    /// The artifact names do not form a valid tree.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Uploading the blocks failed.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The deployment failed after every block was uploaded.
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

/// The result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// The root of the published tree.
    pub root: Cid,
    /// The URL that was handed to the deployer.
    pub static_url: String,
    /// What the upload did.
    pub upload: UploadSummary,
}

/// Computes the tree of `artifacts`.
pub fn address_artifacts(artifacts: &[Artifact]) -> Result<AddressedTree, AddressError> {
    address(
        artifacts
            .iter()
            .map(|artifact| (artifact.name.as_str(), artifact.content.clone())),
    )
}

/// Uploads the blocks of `tree` and, once every block is present, deploys its root to
/// `account_id`.
pub async fn publish_tree(
    tree: &AddressedTree,
    uploader: &DeduplicatingUploader,
    deployer: &dyn Deployer,
    account_id: &str,
) -> Result<Published, PublishError> {
    let root = tree.root();
    tracing::info!(
        "publishing {} blocks ({} bytes) with root {root}",
        tree.blocks().len(),
        tree.size()
    );

    let upload = uploader.upload(tree.blocks()).await?;
    tracing::info!(
        "{} blocks were already present, {} written",
        upload.present,
        upload.written + upload.already_applied
    );

    let static_url = static_url(&root);
    deployer.deploy(account_id, &static_url).await?;

    Ok(Published {
        root,
        static_url,
        upload,
    })
}
