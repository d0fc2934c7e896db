//! Construction of the HTTP clients used by sitesmith.

use std::sync::Arc;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryPolicy, RetryTransientMiddleware};

use crate::BearerTokenMiddleware;

/// The user agent sent with every request.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Returns a plain client that identifies itself with [`APP_USER_AGENT`].
pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
}

/// Wraps a client with middleware.
///
/// Transient failures are retried with `retry_policy` when one is given and, when a `token` is
/// given, every request is authenticated with it.
pub fn client_with_middleware<P>(
    client: reqwest::Client,
    retry_policy: Option<P>,
    token: Option<String>,
) -> ClientWithMiddleware
where
    P: RetryPolicy + Send + Sync + 'static,
{
    let mut builder = ClientBuilder::new(client);
    if let Some(policy) = retry_policy {
        builder = builder.with(RetryTransientMiddleware::new_with_policy(policy));
    }
    if let Some(token) = token {
        builder = builder.with_arc(Arc::new(BearerTokenMiddleware::new(token)));
    }
    builder.build()
}
