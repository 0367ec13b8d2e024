//! btleplug-backed transport.
//!
//! Wraps a discovered [`Peripheral`] as a [`ConnectableDevice`] and the
//! resulting connection as a [`GattLink`], caching characteristics by UUID.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::link::{ConnectableDevice, GattLink};
use crate::error::{Error, Result};

/// An EasyTouch thermostat reachable through btleplug.
#[derive(Debug, Clone)]
pub struct EasyTouchPeripheral {
    peripheral: Peripheral,
    address: String,
}

impl EasyTouchPeripheral {
    /// Wrap a peripheral obtained from the host's discovery layer.
    pub fn new(peripheral: Peripheral) -> Self {
        let address = peripheral.address().to_string();
        Self {
            peripheral,
            address,
        }
    }

    /// Wrap a peripheral under an explicit identifier.
    ///
    /// Useful on macOS where the MAC address is not exposed.
    pub fn with_address(peripheral: Peripheral, address: impl Into<String>) -> Self {
        Self {
            peripheral,
            address: address.into(),
        }
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }
}

#[async_trait]
impl ConnectableDevice for EasyTouchPeripheral {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<Box<dyn GattLink>> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral
                .connect()
                .await
                .map_err(|e| Error::ConnectionFailed {
                    reason: e.to_string(),
                })?;
        } else {
            debug!("Peripheral {} already connected at BLE level", self.address);
        }

        info!("Connected to thermostat {}", self.address);

        if let Err(e) = self.peripheral.discover_services().await {
            warn!("Failed to discover services on {}: {}", self.address, e);
        }

        let link = PeripheralLink::new(self.peripheral.clone(), self.address.clone());
        link.cache_characteristics();
        Ok(Box::new(link))
    }
}

/// Live connection to a btleplug peripheral.
pub struct PeripheralLink {
    peripheral: Peripheral,
    address: String,
    characteristics: RwLock<HashMap<Uuid, Characteristic>>,
}

impl PeripheralLink {
    fn new(peripheral: Peripheral, address: String) -> Self {
        Self {
            peripheral,
            address,
            characteristics: RwLock::new(HashMap::new()),
        }
    }

    fn cache_characteristics(&self) {
        let mut chars = self.characteristics.write();
        chars.clear();

        for characteristic in self.peripheral.characteristics() {
            trace!(
                "Found characteristic {} in service {}",
                characteristic.uuid,
                characteristic.service_uuid
            );
            chars.insert(characteristic.uuid, characteristic);
        }

        debug!(
            "Cached {} characteristics for {}",
            chars.len(),
            self.address
        );
    }

    fn characteristic(&self, uuid: &Uuid) -> Result<Characteristic> {
        if let Some(c) = self.characteristics.read().get(uuid) {
            return Ok(c.clone());
        }

        // The table may have been populated after we cached it.
        self.cache_characteristics();
        self.characteristics
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }
}

#[async_trait]
impl GattLink for PeripheralLink {
    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    fn has_services(&self) -> bool {
        !self.peripheral.services().is_empty()
    }

    async fn discover_services(&self) -> Result<()> {
        self.peripheral.discover_services().await?;
        self.cache_characteristics();
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8], with_response: bool) -> Result<()> {
        let target = self.characteristic(&characteristic)?;

        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        self.peripheral.write(&target, data, write_type).await?;

        trace!(
            "Wrote {} bytes to characteristic {}",
            data.len(),
            characteristic
        );

        Ok(())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        let target = self.characteristic(&characteristic)?;
        let data = self.peripheral.read(&target).await?;

        trace!(
            "Read {} bytes from characteristic {}",
            data.len(),
            characteristic
        );

        Ok(data)
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        debug!("Disconnected from thermostat {}", self.address);
        Ok(())
    }
}
