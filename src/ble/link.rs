//! Transport seam between the session state machine and the radio.
//!
//! The session layer only ever talks to a [`ConnectableDevice`] supplied by
//! the caller and to the [`GattLink`] it returns. Discovery and adapter
//! selection stay outside this crate.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// One live GATT connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GattLink: Send + Sync {
    /// Whether the link is still up.
    async fn is_connected(&self) -> bool;

    /// Whether the service table is populated.
    fn has_services(&self) -> bool;

    /// Rediscover services and refresh the characteristic table.
    async fn discover_services(&self) -> Result<()>;

    /// Write a characteristic.
    async fn write(&self, characteristic: Uuid, data: &[u8], with_response: bool) -> Result<()>;

    /// Read a characteristic.
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>>;

    /// Close the link.
    async fn disconnect(&self) -> Result<()>;
}

/// A device reference that can open a [`GattLink`].
#[async_trait]
pub trait ConnectableDevice: Send + Sync {
    /// Stable address or identifier of the device.
    fn address(&self) -> &str;

    /// Open a transport connection. Callers bound this with their own timeout.
    async fn connect(&self) -> Result<Box<dyn GattLink>>;
}
