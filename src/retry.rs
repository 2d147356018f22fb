// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded retry for Kubernetes API calls.
//!
//! The restore engine never retries a failed resource itself; transient API
//! errors (rate limiting, 5xx, connection loss) are absorbed here at the
//! client boundary, so the worker sees at most one failure per resource and
//! records it with an honest `retryable` flag. Transience is decided by
//! [`ClusterError::is_transient`], the same classification the worker uses
//! for per-resource outcomes.

use crate::errors::ClusterError;
use rand::RngExt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Capped exponential backoff with jitter and a total time budget.
///
/// One policy instance is shared by the whole client; the per-call state is
/// just the attempt counter and the start instant.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub first_delay: Duration,
    /// Upper bound on the delay between attempts
    pub max_delay: Duration,
    /// Total time budget across all attempts of one call
    pub budget: Duration,
    /// Growth factor applied per attempt
    pub growth: f64,
    /// Jitter fraction applied to each delay (0.2 = ±20%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            first_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(20),
            budget: Duration::from_secs(120),
            growth: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Jittered delay before retry number `attempt` (1-based), or `None`
    /// when the call's time budget is already spent.
    fn delay_for(&self, attempt: u32, started: Instant) -> Option<Duration> {
        if started.elapsed() >= self.budget {
            return None;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.first_delay.as_secs_f64() * self.growth.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let delayed = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            rand::rng().random_range((capped - spread).max(0.0)..=capped + spread)
        } else {
            capped
        };

        Some(Duration::from_secs_f64(delayed))
    }
}

/// Run one Kubernetes call under a retry policy.
///
/// Transient errors are retried until the policy's budget runs out; the last
/// error is then surfaced. Permanent errors (4xx other than 429) surface on
/// the first attempt.
///
/// # Arguments
///
/// * `policy` - The backoff policy to apply
/// * `operation_name` - Short call description for log fields (e.g. `list namespaces`)
/// * `operation` - Async closure performing the call
///
/// # Errors
///
/// Returns the final [`ClusterError`] once the call is given up on.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ClusterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt,
                        elapsed = ?started.elapsed(),
                        "Call recovered after backing off"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let err = ClusterError::from(err);
                if !err.is_transient() {
                    debug!(
                        operation = operation_name,
                        error = %err,
                        "Permanent API error, surfacing without retry"
                    );
                    return Err(err);
                }

                match policy.delay_for(attempt, started) {
                    Some(delay) => {
                        warn!(
                            operation = operation_name,
                            attempt = attempt,
                            backoff = ?delay,
                            error = %err,
                            "Transient API error, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            elapsed = ?started.elapsed(),
                            error = %err,
                            "Retry budget spent, surfacing the failure"
                        );
                        return Err(err);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
