//! The remote content-addressed store that blocks are uploaded to.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use sitesmith_cas::{Block, Cid};
use sitesmith_networking::{
    retry_policies::{bounded_retry_policy, RetryDecision, RetryPolicy},
    Redact,
};
use url::Url;

/// The default time after which an existence check is abandoned.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2500);

/// The default number of existence checks made for a block before giving up.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 3;

/// Fragments of store errors that mean the write does not have to be repeated: either the store
/// is still being initialized or the block was already written.
pub const ALREADY_APPLIED_MARKERS: &[&str] = &[
    "Cannot find contract code for account",
    "Contract method is not found",
];

/// How a successful write was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The store accepted the block.
    Written,
    /// The store reported an error that indicates the write was already applied.
    AlreadyApplied,
}

/// An error that can occur while checking whether a block is present.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The gateway answered with something other than found or not found.
    #[error("unexpected status {status} while checking for block {cid}")]
    UnexpectedStatus {
        /// The block that was checked.
        cid: Cid,
        /// The status of the response.
        status: StatusCode,
    },

    /// Every attempt timed out or failed to connect.
    #[error("could not determine whether block {cid} exists after {attempts} attempts: {reason}")]
    Exhausted {
        /// The block that was checked.
        cid: Cid,
        /// The number of requests that were made.
        attempts: u32,
        /// Why the last attempt failed.
        reason: String,
    },

    /// No gateway URL could be formed for the block.
    #[error("invalid gateway url for block {cid}")]
    InvalidUrl {
        /// The block that was checked.
        cid: Cid,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },
}

/// An error that can occur while writing a block.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered with an error that is not known to be harmless.
    #[error("the store rejected block {cid} ({status}): {message}")]
    Rejected {
        /// The block that was written.
        cid: Cid,
        /// The status of the response.
        status: StatusCode,
        /// The body of the response.
        message: String,
    },

    /// The request could not be sent.
    #[error("failed to send block {cid} to the store")]
    Transport {
        /// The block that was written.
        cid: Cid,
        /// The transport failure.
        #[source]
        source: reqwest_middleware::Error,
    },
}

/// A content-addressed store that blocks can be checked for and written to.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Returns true if the store already holds the block identified by `cid`.
    async fn contains(&self, cid: &Cid) -> Result<bool, ProbeError>;

    /// Writes `block` to the store. Writing the same block more than once is harmless.
    async fn put(&self, block: &Block) -> Result<PutOutcome, StoreError>;
}

/// Classifies a rejected write by the body of the response.
pub fn classify_rejection(
    cid: Cid,
    status: StatusCode,
    message: String,
) -> Result<PutOutcome, StoreError> {
    if ALREADY_APPLIED_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        tracing::debug!("block {cid} was already applied ({status}): {message}");
        return Ok(PutOutcome::AlreadyApplied);
    }
    Err(StoreError::Rejected {
        cid,
        status,
        message,
    })
}

/// A [`BlockStore`] that checks for blocks through an HTTP gateway (`HEAD {gateway}/ipfs/{cid}`)
/// and writes them by posting the raw bytes to a store endpoint.
#[derive(Clone)]
pub struct HttpBlockStore {
    client: ClientWithMiddleware,
    gateway: Url,
    store_endpoint: Url,
    probe_timeout: Duration,
    retry_policy: Arc<dyn RetryPolicy + Send + Sync>,
}

impl std::fmt::Debug for HttpBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBlockStore")
            .field("gateway", &self.gateway.clone().redact())
            .field("store_endpoint", &self.store_endpoint.clone().redact())
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpBlockStore {
    /// Constructs a new store.
    pub fn new(client: ClientWithMiddleware, mut gateway: Url, store_endpoint: Url) -> Self {
        if !gateway.path().ends_with('/') {
            let path = format!("{}/", gateway.path());
            gateway.set_path(&path);
        }
        Self {
            client,
            gateway,
            store_endpoint,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            retry_policy: Arc::new(bounded_retry_policy(DEFAULT_PROBE_ATTEMPTS)),
        }
    }

    /// Sets the time after which a single existence check is abandoned.
    pub fn with_probe_timeout(self, probe_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            ..self
        }
    }

    /// Makes at most `attempts` existence checks per block, backing off exponentially.
    pub fn with_probe_attempts(self, attempts: u32) -> Self {
        self.with_retry_policy(bounded_retry_policy(attempts))
    }

    /// Sets the policy that decides whether a timed out or failed existence check is repeated.
    pub fn with_retry_policy(self, policy: impl RetryPolicy + Send + Sync + 'static) -> Self {
        Self {
            retry_policy: Arc::new(policy),
            ..self
        }
    }

    /// The URL at which the gateway serves `cid`.
    pub fn probe_url(&self, cid: &Cid) -> Result<Url, url::ParseError> {
        self.gateway.join(&format!("ipfs/{cid}"))
    }
}

#[async_trait]
impl BlockStore for HttpBlockStore {
    #[tracing::instrument(skip_all, fields(cid = %cid))]
    async fn contains(&self, cid: &Cid) -> Result<bool, ProbeError> {
        let url = self
            .probe_url(cid)
            .map_err(|source| ProbeError::InvalidUrl { cid: *cid, source })?;

        let request_start = SystemTime::now();
        let mut current_try = 0;
        loop {
            let reason = match tokio::time::timeout(
                self.probe_timeout,
                self.client.head(url.clone()).send(),
            )
            .await
            {
                Ok(Ok(response)) => {
                    return match response.status() {
                        StatusCode::OK => Ok(true),
                        StatusCode::NOT_FOUND => Ok(false),
                        status => Err(ProbeError::UnexpectedStatus { cid: *cid, status }),
                    }
                }
                Ok(Err(err)) => err.redact().to_string(),
                Err(_) => format!("timed out after {} ms", self.probe_timeout.as_millis()),
            };

            match self.retry_policy.should_retry(request_start, current_try) {
                RetryDecision::DoNotRetry => {
                    return Err(ProbeError::Exhausted {
                        cid: *cid,
                        attempts: current_try + 1,
                        reason,
                    });
                }
                RetryDecision::Retry { execute_after } => {
                    let sleep_for = execute_after
                        .duration_since(SystemTime::now())
                        .unwrap_or(Duration::ZERO);
                    tracing::debug!(
                        "checking for block {cid} failed ({reason}), retrying in {} ms",
                        sleep_for.as_millis()
                    );
                    tokio::time::sleep(sleep_for).await;
                }
            }

            current_try += 1;
        }
    }

    #[tracing::instrument(skip_all, fields(cid = %block.cid, size = block.len()))]
    async fn put(&self, block: &Block) -> Result<PutOutcome, StoreError> {
        let response = self
            .client
            .post(self.store_endpoint.clone())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(block.data.clone())
            .send()
            .await
            .map_err(|source| StoreError::Transport {
                cid: block.cid,
                source: source.redact(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(PutOutcome::Written);
        }

        let message = response.text().await.unwrap_or_default();
        classify_rejection(block.cid, status, message)
    }
}
