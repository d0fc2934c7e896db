#![deny(missing_docs)]

//! Networking utilities for sitesmith: client construction, retry policies, bearer authentication
//! and redaction of secrets before URLs end up in logs or error messages.
pub use authentication_middleware::BearerTokenMiddleware;
pub use client::{client_with_middleware, default_client, APP_USER_AGENT};

pub mod authentication_middleware;
mod client;
pub mod retry_policies;

mod redaction;

pub use redaction::{redact_known_secrets_from_url, Redact, DEFAULT_REDACTION_STR};
