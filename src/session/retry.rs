//! Retry policies shared by connect, authenticate, read and write.

use std::time::Duration;
use tracing::trace;

use crate::session::backoff::{BackoffLedger, Operation};

/// How long to pause before an attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Never pause.
    None,
    /// Pause a fixed time between attempts (not before the first one).
    Fixed(Duration),
    /// Pause for the ledger's current delay before every attempt.
    Ledger(Operation),
}

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, at least one.
    pub max_attempts: u32,
    /// Pause applied before attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Iterator over attempt numbers, starting at 1.
    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts
    }

    /// Whether another attempt follows `attempt`.
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Apply the pause owed before `attempt` (1-based).
    pub async fn pause_before(&self, attempt: u32, ledger: &BackoffLedger, device: &str) {
        match self.backoff {
            Backoff::None => {}
            Backoff::Fixed(delay) => {
                if attempt > 1 && !delay.is_zero() {
                    trace!("Pausing {:?} before attempt {}", delay, attempt);
                    tokio::time::sleep(delay).await;
                }
            }
            Backoff::Ledger(op) => ledger.wait(device, op).await,
        }
    }
}
