#![deny(missing_docs)]

//! Sitesmith generates small static websites with a language model and publishes them as
//! content-addressed trees.
//!
//! The pipeline has four stages, each of which lives in its own crate and is re-exported here:
//!
//! * [`chat`] streams answers of a chat completions endpoint and recovers from context overflow
//!   by summarizing the conversation.
//! * [`artifacts`] extracts the files that the model writes in `---name---` blocks and keeps the
//!   current version of every file.
//! * [`cas`] computes the identifiers and blocks of the directory tree of those files.
//! * [`upload`] checks which blocks a gateway already serves and uploads the rest in bounded
//!   batches.
//!
//! A [`Session`] ties them together, and [`Deployer`] is the boundary to whatever makes the
//! published root reachable.

pub mod deploy;
pub mod publish;
mod session;
pub mod setup;

pub use deploy::{DeployError, Deployer, LoggingDeployer};
pub use publish::{
    address_artifacts, publish_tree, static_url, PublishError, Published, STATIC_URL_SCHEME,
};
pub use session::{file_request, Session, Turn, DEFAULT_GENERATION_CONCURRENCY};

pub use sitesmith_artifacts as artifacts;
pub use sitesmith_cas as cas;
pub use sitesmith_chat as chat;
pub use sitesmith_config as config;
pub use sitesmith_upload as upload;
