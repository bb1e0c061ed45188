//! Bounded polling for state that converges eventually.
//!
//! Cluster and TrustyAI state is never cached: each cycle re-fetches it and
//! reports whether it has converged. The loop sleeps a fixed interval between
//! cycles, capped at the remaining budget, and gives up with
//! [`HarnessError::Timeout`] once the wall-clock budget is spent.

use crate::error::{HarnessError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

/// Categories of eventual consistency with their expected settle times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyCategory {
    /// Model-server pods scheduled and running with payload forwarding (180s).
    PodReadiness,

    /// Freshly created namespace reaching `Active` (120s).
    NamespaceActive,

    /// Namespace finalizers finishing after delete (600s).
    NamespaceDeletion,
}

impl ConsistencyCategory {
    /// Get the maximum timeout for this consistency category.
    pub fn timeout(&self) -> Duration {
        match self {
            ConsistencyCategory::PodReadiness => Duration::from_secs(180),
            ConsistencyCategory::NamespaceActive => Duration::from_secs(120),
            ConsistencyCategory::NamespaceDeletion => Duration::from_secs(600),
        }
    }

    /// Delay between polls.
    pub fn interval(&self) -> Duration {
        match self {
            ConsistencyCategory::PodReadiness => Duration::from_secs(5),
            ConsistencyCategory::NamespaceActive => Duration::from_secs(2),
            ConsistencyCategory::NamespaceDeletion => Duration::from_secs(5),
        }
    }

    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(self.interval(), self.timeout())
    }
}

/// Interval and wall-clock budget of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// The same policy with `elapsed` already spent from its budget.
    pub fn remaining_after(&self, elapsed: Duration) -> Self {
        Self::new(self.interval, self.timeout.saturating_sub(elapsed))
    }
}

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence<T> {
    /// The condition holds; polling stops with this value.
    Converged(T),

    /// Not there yet. The description of what was observed ends up in the
    /// timeout error if the budget runs out.
    Pending(String),
}

/// Errors that never make a cycle ignorable.
pub fn no_errors_ignorable(_: &HarnessError) -> bool {
    false
}

/// Poll `check` until it converges or the budget runs out.
///
/// Errors for which `is_ignorable` holds are treated as a pending cycle and
/// polling continues; any other error aborts the loop immediately. At least
/// one cycle always runs, even with a zero timeout.
pub async fn poll_until_converged<T, F, Fut, I>(
    policy: PollPolicy,
    what: &str,
    is_ignorable: I,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Convergence<T>>>,
    I: Fn(&HarnessError) -> bool,
{
    let start = Instant::now();
    let mut cycles: u32 = 0;

    loop {
        cycles += 1;

        let detail = match check().await {
            Ok(Convergence::Converged(value)) => {
                debug!(what = %what, cycles, elapsed = ?start.elapsed(), "Converged");
                return Ok(value);
            }
            Ok(Convergence::Pending(detail)) => detail,
            Err(e) if is_ignorable(&e) => {
                trace!(what = %what, error = %e, "Ignoring transient error");
                e.to_string()
            }
            Err(e) => return Err(e),
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(HarnessError::Timeout {
                what: what.to_string(),
                waited: policy.timeout,
                detail,
            });
        }

        trace!(what = %what, cycle = cycles, detail = %detail, "Not converged yet");

        // Cap delay at remaining time
        let remaining = policy.timeout.saturating_sub(elapsed);
        sleep(policy.interval.min(remaining)).await;
    }
}
