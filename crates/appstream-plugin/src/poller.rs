//! State-convergence polling
//!
//! Repeatedly fetches the remote state of a resource until it equals a
//! target value. The interval is fixed (no backoff, no jitter) and a fetch
//! error aborts the wait immediately. Unlike a bare loop, every wait is
//! bounded by an optional deadline and observes a cancellation token.

use crate::error::{ProviderError, Result};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Delay between two state checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Upper bound on a single wait
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Polling configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between two fetches
    pub interval: Duration,

    /// Deadline for the whole wait; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }
}

/// Wait until `fetch` reports `target`.
///
/// Returns the number of fetches performed. Fails with
/// [`ProviderError::Timeout`] once the deadline passes, with
/// [`ProviderError::Cancelled`] when `cancel` fires, or with the first
/// error returned by `fetch`.
pub async fn wait_for_state<S, F, Fut>(
    resource: &str,
    target: &S,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<u32>
where
    S: PartialEq + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let started = Instant::now();
    let deadline = config.timeout.map(|t| started + t);
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let current = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(resource, target)),
            current = fetch() => current?,
        };

        if &current == target {
            tracing::info!(
                "{} reached {} after {} check(s)",
                resource,
                target,
                attempts
            );
            return Ok(attempts);
        }

        let delay = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ProviderError::Timeout {
                        resource: resource.to_string(),
                        target: target.to_string(),
                        elapsed: now - started,
                    });
                }
                config.interval.min(deadline - now)
            }
            None => config.interval,
        };

        tracing::debug!(
            "{} is {}, waiting {:?} for {}",
            resource,
            current,
            delay,
            target
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(resource, target)),
            _ = sleep(delay) => {}
        }
    }
}

fn cancelled(resource: &str, target: &impl Display) -> ProviderError {
    ProviderError::Cancelled {
        resource: resource.to_string(),
        target: target.to_string(),
    }
}
