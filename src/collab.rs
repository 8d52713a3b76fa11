//! Uniform collaborator call wrapper
//!
//! Every call into a [`ContentStore`](crate::store::ContentStore),
//! [`TextGenerator`](crate::generate::TextGenerator) or
//! [`Notifier`](crate::notify::Notifier) goes through [`call`], which retries
//! with exponential backoff and classifies the final failure by the role of
//! the call. Provider errors (`anyhow`) never reach orchestration logic
//! unclassified.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{PipelineError, Result};

/// What a collaborator call is for; decides the error kind on exhaustion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listing, fetching or reading from the content store
    Store,
    /// Caption / overlay generation
    Generate,
    /// Approval delivery
    Notify,
    /// Uploading the finished artifact to the store
    Archive,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Generate => "generate",
            Self::Notify => "notify",
            Self::Archive => "archive",
        }
    }

    fn classify(self, message: String) -> PipelineError {
        match self {
            Self::Store => PipelineError::SourceUnavailable(message),
            Self::Generate => PipelineError::Generation(message),
            Self::Notify | Self::Archive => PipelineError::Delivery(message),
        }
    }
}

/// Number of attempts and backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt` (1-based; attempt 1 never waits).
    /// base, base*4, base*16, ...
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 4u32.saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor)
    }
}

/// Run `op` under `policy`, classifying the final failure by `role`.
///
/// An error that already is a [`PipelineError`] is passed through unchanged;
/// a non-retryable one (e.g. `Configuration`) stops retrying immediately.
pub async fn call<T, F, Fut>(role: Role, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if let Some(pipeline) = err.downcast_ref::<PipelineError>() {
                    if !pipeline.is_retryable() {
                        warn!("{} call failed permanently: {:#}", role.as_str(), err);
                        return Err(into_pipeline(err, role));
                    }
                }
                warn!(
                    "{} call failed (attempt {}/{}): {:#}",
                    role.as_str(),
                    attempt,
                    attempts,
                    err
                );
                last_error = Some(err);
            }
        }
    }

    let err = last_error.unwrap_or_else(|| anyhow::anyhow!("no attempts made"));
    Err(into_pipeline(err, role))
}

fn into_pipeline(err: anyhow::Error, role: Role) -> PipelineError {
    match err.downcast::<PipelineError>() {
        Ok(pipeline) => pipeline,
        Err(other) => role.classify(format!("{other:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay: Duration::from_millis(50),
        };
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(50));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let value = call(Role::Store, &fast(3), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_classified_by_role() {
        let cases = [
            (Role::Store, "source-unavailable"),
            (Role::Generate, "generation"),
            (Role::Notify, "delivery"),
            (Role::Archive, "delivery"),
        ];
        for (role, kind) in cases {
            let calls = AtomicU32::new(0);
            let err = call(role, &fast(2), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("connection reset"))
            })
            .await
            .unwrap_err();
            assert_eq!(err.kind(), kind);
            assert!(err.to_string().contains("connection reset"));
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        }
    }

    #[tokio::test]
    async fn test_configuration_error_not_retried() {
        let calls = AtomicU32::new(0);
        let err = call(Role::Generate, &fast(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(PipelineError::Configuration("no api key".into()).into())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_retry_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = tokio_test::block_on(call(Role::Notify, &RetryPolicy::no_retry(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow::anyhow!("502 Bad Gateway"))
        }));
        let err = tokio_test::assert_err!(outcome);
        assert!(matches!(err, PipelineError::Delivery(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            attempts: 0,
            base_delay_ms: 250,
        });
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(RetryPolicy::no_retry().delay_before(2), Duration::ZERO);
    }
}
