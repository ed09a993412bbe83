//! Unified retry and backoff logic for caravan storage adapters
//!
//! This crate provides consistent retry policies for the storage-facing
//! operations in the caravan ecosystem. The export/import pipelines run
//! strictly sequentially, so the entry points here are synchronous and
//! block between attempts.

use std::time::Duration;

use backoff::{Error as BackoffError, ExponentialBackoff, ExponentialBackoffBuilder};
use thiserror::Error;
use tracing::{debug, warn};

/// Error returned when an operation exhausts its retry budget.
#[derive(Error, Debug)]
#[error("Operation '{operation}' exhausted its retry budget: {source}")]
pub struct RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    pub operation: &'static str,
    #[source]
    pub source: E,
}

/// Trait for categorizing errors as transient or permanent.
pub trait RetryableError {
    /// Returns true if the error is transient and the operation should be retried.
    fn is_transient(&self) -> bool;

    /// Returns true if the error is permanent and retries should stop.
    fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Execute an operation with the default backoff policy.
///
/// Transient errors (per [`RetryableError`]) are retried with exponential
/// backoff; permanent errors abort immediately. The original error is
/// returned once the budget is exhausted.
pub fn with_backoff<T, E, F>(op_name: &'static str, f: F) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    with_custom_backoff(op_name, default_backoff_policy(), f)
}

/// Execute an operation with a custom backoff policy.
pub fn with_custom_backoff<T, E, F>(
    op_name: &'static str,
    policy: ExponentialBackoff,
    mut f: F,
) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 0usize;

    let outcome = backoff::retry_notify(
        policy,
        || {
            attempt += 1;
            debug!("Attempting operation '{}' (attempt {})", op_name, attempt);
            f().map_err(|e| {
                if e.is_transient() {
                    BackoffError::transient(e)
                } else {
                    BackoffError::permanent(e)
                }
            })
        },
        |err, delay: Duration| {
            warn!(
                "Operation '{}' failed transiently ({}), retrying in {:?}",
                op_name, err, delay
            );
        },
    );

    match outcome {
        Ok(value) => {
            if attempt > 1 {
                debug!(
                    "Operation '{}' succeeded after {} attempts",
                    op_name, attempt
                );
            }
            Ok(value)
        }
        Err(BackoffError::Permanent(e)) => {
            warn!("Operation '{}' failed permanently: {}", op_name, e);
            Err(e)
        }
        Err(BackoffError::Transient { err, .. }) => {
            warn!(
                "Operation '{}' gave up after {} attempts: {}",
                op_name, attempt, err
            );
            Err(err)
        }
    }
}

/// Default backoff policy for general operations.
pub fn default_backoff_policy() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(100))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(Duration::from_secs(30)))
        .with_multiplier(2.0)
        .build()
}

/// Backoff policy optimized for cloud storage operations.
pub fn cloud_storage_backoff_policy() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(Some(Duration::from_secs(60)))
        .with_multiplier(1.5)
        .build()
}

/// Backoff policy for local storage operations (shorter timeouts).
pub fn local_storage_backoff_policy() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(50))
        .with_max_interval(Duration::from_secs(1))
        .with_max_elapsed_time(Some(Duration::from_secs(10)))
        .with_multiplier(2.0)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Error, Debug)]
    enum TestError {
        #[error("transient glitch")]
        Glitch,
        #[error("permanent refusal")]
        Refusal,
    }

    impl RetryableError for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Glitch)
        }
    }

    fn quick_policy() -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(5))
            .with_max_elapsed_time(Some(Duration::from_millis(200)))
            .build()
    }

    #[test]
    fn succeeds_first_try() {
        let result: Result<&str, TestError> =
            with_custom_backoff("test_op", quick_policy(), || Ok("success"));
        assert_eq!(result.unwrap(), "success");
    }

    #[test]
    fn retries_transient_then_succeeds() {
        let attempts = Cell::new(0usize);
        let result: Result<&str, TestError> = with_custom_backoff("test_op", quick_policy(), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(TestError::Glitch)
            } else {
                Ok("success")
            }
        });
        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn permanent_error_aborts_immediately() {
        let attempts = Cell::new(0usize);
        let result: Result<(), TestError> = with_custom_backoff("test_op", quick_policy(), || {
            attempts.set(attempts.get() + 1);
            Err(TestError::Refusal)
        });
        assert!(matches!(result, Err(TestError::Refusal)));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn transient_error_exhausts_budget() {
        let result: Result<(), TestError> =
            with_custom_backoff("test_op", quick_policy(), || Err(TestError::Glitch));
        assert!(matches!(result, Err(TestError::Glitch)));
    }
}
