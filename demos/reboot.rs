//! Reboot example
//!
//! Reboots a thermostat. The device usually drops the link while accepting
//! the reset, which is reported as success.
//!
//! Run with:
//!   cargo run --example reboot -- --address AA:BB:CC:DD:EE:FF --password 1234

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::Manager;
use easytouch_ble::{Credentials, EasyTouchClient, EasyTouchPeripheral, Error, Result};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,easytouch_ble=debug")
        .init();

    let args: Vec<String> = std::env::args().collect();
    let value_of = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let address = value_of("--address").ok_or_else(|| Error::Internal("--address is required".into()))?;
    let password = value_of("--password").unwrap_or_default();

    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::transport("no Bluetooth adapter found"))?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    adapter.stop_scan().await?;

    let mut found = None;
    for peripheral in adapter.peripherals().await? {
        if peripheral.address().to_string().eq_ignore_ascii_case(&address) {
            found = Some(peripheral);
            break;
        }
    }
    let peripheral = found.ok_or_else(|| Error::ConnectionFailed {
        reason: format!("thermostat {} not found", address),
    })?;

    let client = EasyTouchClient::new(Credentials::new(password));
    let device = EasyTouchPeripheral::new(peripheral);

    if client.reboot(&device).await {
        println!("Reboot sent to {}", address);
    } else {
        println!("Reboot of {} failed", address);
    }

    Ok(())
}
