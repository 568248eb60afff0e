//! Adaptive per-call deadlines for repository operations
//!
//! A repository call gets a base budget plus a small allowance for every row
//! beyond the first, capped so a large batch can never hold a connection for
//! unbounded time. Expiry is reported as [`PortError::Timeout`] carrying the
//! operation label and the computed limit, which keeps "this step timed out"
//! distinguishable from a caller dropping the request.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::ports::PortError;

/// Deadline calculation for repository calls
///
/// # Example
///
/// ```rust
/// use core_kernel::TimeoutPolicy;
/// use std::time::Duration;
///
/// let policy = TimeoutPolicy::default();
/// assert_eq!(policy.deadline_for(50), Duration::from_millis(4450));
/// assert_eq!(policy.deadline_for(10_000), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    base: Duration,
    per_row: Duration,
    cap: Duration,
}

impl TimeoutPolicy {
    pub const DEFAULT_BASE: Duration = Duration::from_secs(2);
    pub const DEFAULT_PER_ROW: Duration = Duration::from_millis(50);
    pub const DEFAULT_CAP: Duration = Duration::from_secs(10);

    /// Creates a policy with explicit budget parameters
    pub fn new(base: Duration, per_row: Duration, cap: Duration) -> Self {
        Self { base, per_row, cap }
    }

    /// Computes the deadline for a call touching `row_count` rows
    ///
    /// `base + per_row * max(0, row_count - 1)`, never above the cap.
    pub fn deadline_for(&self, row_count: usize) -> Duration {
        let extra_rows = u32::try_from(row_count.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base
            .saturating_add(self.per_row.saturating_mul(extra_rows))
            .min(self.cap)
    }

    /// Runs `call` under the deadline for `row_count` rows
    ///
    /// # Arguments
    ///
    /// * `operation` - Label used in the timeout diagnostic
    /// * `row_count` - Expected number of rows the call reads or writes
    /// * `call` - The repository future
    ///
    /// # Errors
    ///
    /// Returns `PortError::Timeout` when the deadline expires, otherwise the
    /// call's own error converted into a `PortError`.
    pub async fn run<T, E, F>(&self, operation: &str, row_count: usize, call: F) -> Result<T, PortError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<PortError>,
    {
        let limit = self.deadline_for(row_count);
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                warn!(operation, limit_ms = limit.as_millis() as u64, "repository call timed out");
                Err(PortError::timeout(operation, limit))
            }
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_PER_ROW, Self::DEFAULT_CAP)
    }
}
