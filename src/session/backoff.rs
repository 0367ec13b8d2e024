//! Adaptive per-device, per-operation backoff ledger.
//!
//! Each (device address, operation) pair tracks its consecutive failures and
//! the delay applied before the next attempt of that operation. Failures grow
//! the delay as `0.5 * 2^min(failures, 3)` seconds up to the ceiling; each
//! success drops one failure and shrinks the delay by a quarter, snapping it
//! to zero once the failures are gone and the delay is below 0.1s.
//!
//! The ledger is shared by every task using the client. The device gate
//! already serializes all operations on one device, so the entries of a
//! device are never contended; the inner mutex exists only to make the map
//! itself `Sync` and is never held across an await point.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Default ceiling of the backoff delay in seconds.
pub const DEFAULT_MAX_DELAY_SECS: f64 = 6.0;

const BASE_DELAY_SECS: f64 = 0.5;
const MAX_EXPONENT: u32 = 3;
const DECAY_FACTOR: f64 = 0.75;
const SNAP_THRESHOLD_SECS: f64 = 0.1;

/// Kind of operation tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Establishing a transport connection.
    Connect,
    /// Writing the password characteristic.
    Auth,
    /// Reading a characteristic.
    Read,
    /// Writing a characteristic.
    Write,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Auth => write!(f, "auth"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Failure count and current delay of one (device, operation) pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BackoffEntry {
    /// Consecutive failures, reduced by one on each success.
    pub failures: u32,
    /// Delay in seconds applied before the next attempt.
    pub delay_secs: f64,
}

/// Process-lifetime backoff store keyed by device address and operation.
#[derive(Debug)]
pub struct BackoffLedger {
    entries: Mutex<HashMap<(String, Operation), BackoffEntry>>,
    max_delay_secs: f64,
}

impl Default for BackoffLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffLedger {
    /// Create an empty ledger with the default 6s ceiling.
    pub fn new() -> Self {
        Self::with_max_delay(Duration::from_secs_f64(DEFAULT_MAX_DELAY_SECS))
    }

    /// Create an empty ledger with a custom ceiling.
    pub fn with_max_delay(max_delay: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_delay_secs: max_delay.as_secs_f64(),
        }
    }

    /// Current delay in seconds, 0.0 if nothing was recorded.
    pub fn get_delay(&self, device: &str, op: Operation) -> f64 {
        self.entries
            .lock()
            .get(&(device.to_string(), op))
            .map(|e| e.delay_secs)
            .unwrap_or(0.0)
    }

    /// Snapshot of an entry.
    pub fn entry(&self, device: &str, op: Operation) -> Option<BackoffEntry> {
        self.entries.lock().get(&(device.to_string(), op)).copied()
    }

    /// Count a failure and return the new delay in seconds.
    pub fn record_failure(&self, device: &str, op: Operation) -> f64 {
        let mut entries = self.entries.lock();
        let entry = entries.entry((device.to_string(), op)).or_default();

        entry.failures = entry.failures.saturating_add(1);
        let exponent = entry.failures.min(MAX_EXPONENT) as i32;
        entry.delay_secs = (BASE_DELAY_SECS * 2f64.powi(exponent)).min(self.max_delay_secs);

        debug!(
            "Increased {} delay for {} to {:.1}s (failures: {})",
            op, device, entry.delay_secs, entry.failures
        );

        entry.delay_secs
    }

    /// Count a success, decaying the failure count and the delay.
    pub fn record_success(&self, device: &str, op: Operation) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&(device.to_string(), op)) else {
            return;
        };

        if entry.failures == 0 && entry.delay_secs == 0.0 {
            return;
        }

        entry.failures = entry.failures.saturating_sub(1);
        entry.delay_secs = (entry.delay_secs * DECAY_FACTOR).max(0.0);

        if entry.failures == 0 && entry.delay_secs < SNAP_THRESHOLD_SECS {
            entry.delay_secs = 0.0;
            debug!("Reset {} delay for {} to 0.0s", op, device);
        } else {
            debug!(
                "Adjusted {} delay for {} to {:.2}s (failures: {})",
                op, device, entry.delay_secs, entry.failures
            );
        }
    }

    /// Sleep for the current delay of a pair, if any.
    pub async fn wait(&self, device: &str, op: Operation) {
        let delay = self.get_delay(device, op);
        if delay > 0.0 {
            debug!("Waiting {:.2}s before {} on {}", delay, op, device);
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
    }

    /// Forget everything recorded for a device.
    pub fn clear_device(&self, device: &str) {
        self.entries.lock().retain(|(addr, _), _| addr != device);
    }
}
