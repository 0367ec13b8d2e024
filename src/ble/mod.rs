//! BLE communication module.
//!
//! This module provides the transport seam the session layer talks through,
//! its btleplug implementation, and the EasyTouch characteristic table.

pub mod link;
pub mod peripheral;
pub mod uuids;

pub use link::{ConnectableDevice, GattLink};
pub use peripheral::{EasyTouchPeripheral, PeripheralLink};
pub use uuids::*;
