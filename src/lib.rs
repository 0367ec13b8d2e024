//! # easytouch-ble
//!
//! A Rust library for talking to Micro-Air EasyTouch RV thermostats over
//! Bluetooth Low Energy.
//!
//! The thermostat exposes one GATT service with three characteristics: a
//! password characteristic, a JSON command characteristic and a JSON return
//! characteristic. Every operation opens a short-lived session: connect,
//! write the password, run the operation, disconnect.
//!
//! ## Features
//!
//! - **Per-device gate**: operations on one thermostat never interleave
//! - **Connection and authentication retries** with bounded timeouts
//! - **Adaptive backoff** per device and operation, shared across sessions
//! - **Status decoding** into a typed record, plus a climate view
//! - **Reboot** that tolerates the device dropping the link mid-write
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use btleplug::api::{Central, Manager as _};
//! use btleplug::platform::Manager;
//! use easytouch_ble::{Credentials, EasyTouchClient, EasyTouchPeripheral, Result, Thermostat};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = Manager::new().await?;
//!     let adapter = manager
//!         .adapters()
//!         .await?
//!         .into_iter()
//!         .next()
//!         .expect("no Bluetooth adapter");
//!
//!     // Assumes the thermostat was already discovered by a scan.
//!     let peripheral = adapter.peripherals().await?.remove(0);
//!
//!     let client = Arc::new(EasyTouchClient::new(Credentials::new("1234")));
//!     let thermostat = Thermostat::new(client, EasyTouchPeripheral::new(peripheral));
//!
//!     if let Some(status) = thermostat.refresh().await? {
//!         println!("{} reads {}°", status.serial_number, status.face_plate_temperature);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group. BlueZ
//! reports the link loss caused by a reboot as error 133.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.

pub mod ble;
pub mod client;
pub mod climate;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod thermostat;

#[cfg(test)]
mod test_support;

pub use ble::{ConnectableDevice, EasyTouchPeripheral, GattLink};
pub use client::EasyTouchClient;
pub use climate::{ClimateView, FanPreset, HvacAction, HvacMode, TemperatureTarget};
pub use config::{ClientConfig, Credentials};
pub use error::{Error, Result};
pub use protocol::{decode_status, Changes, Command, FanSpeed, OperatingMode, StatusRecord};
pub use session::{BackoffLedger, DeviceLock, Operation};
pub use thermostat::Thermostat;
