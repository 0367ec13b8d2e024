//! Connection session state machine.
//!
//! - [`backoff`]: adaptive per-device, per-operation delays
//! - [`retry`]: bounded retry policies
//! - [`gate`]: per-device serialization gates
//! - [`manager`]: connect, authenticate, reconnect
//! - [`executor`]: GATT reads and writes with retry and reconnection

pub mod backoff;
pub mod executor;
pub mod gate;
pub mod manager;
pub mod retry;

use tracing::{debug, warn};

use crate::ble::link::{ConnectableDevice, GattLink};

pub use backoff::{BackoffEntry, BackoffLedger, Operation};
pub use executor::GattExecutor;
pub use gate::{DeviceLock, GateRegistry};
pub use manager::SessionManager;
pub use retry::{Backoff, RetryPolicy};

/// Connection state for one façade call.
///
/// Holds the physical link (if any) and whether it has been authenticated.
/// Sessions are never pooled: each façade verb creates one and closes it.
/// A session dropped while still holding a link disconnects it in the
/// background.
pub struct Session<'d> {
    device: &'d dyn ConnectableDevice,
    link: Option<Box<dyn GattLink>>,
    authenticated: bool,
}

impl<'d> Session<'d> {
    /// Create an empty session for a device.
    pub fn new(device: &'d dyn ConnectableDevice) -> Self {
        Self {
            device,
            link: None,
            authenticated: false,
        }
    }

    /// The device this session talks to.
    pub fn device(&self) -> &'d dyn ConnectableDevice {
        self.device
    }

    /// Address of the device.
    pub fn address(&self) -> &str {
        self.device.address()
    }

    /// The current link, if any.
    pub fn link(&self) -> Option<&dyn GattLink> {
        self.link.as_deref()
    }

    /// Whether a link is held and still connected.
    pub async fn is_live(&self) -> bool {
        match &self.link {
            Some(link) => link.is_connected().await,
            None => false,
        }
    }

    /// Whether the current link has been authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated && self.link.is_some()
    }

    pub(crate) fn attach(&mut self, link: Box<dyn GattLink>) {
        self.link = Some(link);
        self.authenticated = false;
    }

    pub(crate) fn mark_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Disconnect (if connected) and clear the session.
    pub async fn close(&mut self) {
        self.authenticated = false;
        let Some(link) = self.link.take() else {
            return;
        };

        if link.is_connected().await {
            if let Err(e) = link.disconnect().await {
                debug!("Error disconnecting from {}: {}", self.device.address(), e);
            }
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };

        // Dropped without close(), e.g. the verb was cancelled by a caller timeout.
        let address = self.device.address().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Session for {} dropped with a live link, disconnecting", address);
                handle.spawn(async move {
                    if let Err(e) = link.disconnect().await {
                        debug!("Error disconnecting from {}: {}", address, e);
                    }
                });
            }
            Err(_) => warn!("Session for {} dropped outside a runtime, link left open", address),
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.device.address())
            .field("has_link", &self.link.is_some())
            .field("authenticated", &self.authenticated)
            .finish()
    }
}
