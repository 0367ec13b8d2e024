//! Per-device serialization gates.
//!
//! The radio link carries one GATT transaction at a time, so every façade
//! verb holds its device's gate for its whole duration. Gates are tokio
//! mutexes, which hand out the lock in acquisition order.
//!
//! Holding a [`DeviceLock`] is the proof that the gate is held: internal
//! helpers take `&DeviceLock` instead of locking again, so recursive
//! acquisition of the same gate cannot be written.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{trace, warn};

/// Registry of one gate per device address.
#[derive(Debug, Default)]
pub struct GateRegistry {
    gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl GateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self, address: &str) -> Arc<AsyncMutex<()>> {
        self.gates
            .lock()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for and take the gate of a device.
    pub async fn acquire(&self, address: &str) -> DeviceLock {
        let gate = self.gate(address);
        trace!("Waiting for gate of {}", address);
        let guard = gate.lock_owned().await;
        trace!("Acquired gate of {}", address);
        DeviceLock {
            address: address.to_string(),
            _guard: guard,
        }
    }

    /// Take the gate only if nobody holds it.
    pub fn try_acquire(&self, address: &str) -> Option<DeviceLock> {
        let guard = self.gate(address).try_lock_owned().ok()?;
        Some(DeviceLock {
            address: address.to_string(),
            _guard: guard,
        })
    }

    /// Number of devices with a gate.
    pub fn len(&self) -> usize {
        self.gates.lock().len()
    }

    /// Whether no gate has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held gate of one device. Released on drop.
#[derive(Debug)]
pub struct DeviceLock {
    address: String,
    _guard: OwnedMutexGuard<()>,
}

impl DeviceLock {
    /// Address of the device whose gate is held.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether this lock covers a device.
    pub fn covers(&self, address: &str) -> bool {
        self.address == address
    }

    /// Like [`covers`](Self::covers), logging a warning on mismatch.
    pub fn check(&self, address: &str) -> bool {
        if self.covers(address) {
            return true;
        }
        warn!("Gate held for {} does not cover {}", self.address, address);
        false
    }
}
