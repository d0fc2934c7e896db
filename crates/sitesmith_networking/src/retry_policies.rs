//! Reexports the trait [`RetryPolicy`] from the `retry_policies` crate as well as all
//! implementations.
//!
//! This module also provides the [`DoNotRetryPolicy`] which is useful if you do not want to retry
//! anything.

pub use retry_policies::{policies::*, Jitter, RetryDecision, RetryPolicy};
use std::time::SystemTime;

/// A simple [`RetryPolicy`] that just never retries.
#[derive(Debug, Clone, Copy)]
pub struct DoNotRetryPolicy;
impl RetryPolicy for DoNotRetryPolicy {
    fn should_retry(&self, _: SystemTime, _: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }
}

/// Returns the default retry policy used for requests to the model API.
pub fn default_retry_policy() -> ExponentialBackoff {
    ExponentialBackoff::builder().build_with_max_retries(3)
}

/// Returns a retry policy that allows `attempts` attempts in total, i.e. `attempts - 1` retries.
///
/// Existence probes use this so that the configured count is the number of requests that are
/// made before giving up.
pub fn bounded_retry_policy(attempts: u32) -> ExponentialBackoff {
    ExponentialBackoff::builder().build_with_max_retries(attempts.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_not_retry() {
        assert!(matches!(
            DoNotRetryPolicy.should_retry(SystemTime::now(), 0),
            RetryDecision::DoNotRetry
        ));
    }

    #[test]
    fn test_bounded_retry_policy() {
        let policy = bounded_retry_policy(3);
        let start = SystemTime::now();
        assert!(matches!(
            policy.should_retry(start, 0),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(start, 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(start, 2),
            RetryDecision::DoNotRetry
        ));

        assert!(matches!(
            bounded_retry_policy(1).should_retry(start, 0),
            RetryDecision::DoNotRetry
        ));
    }
}
