//! Thermostat status example
//!
//! Scans for a thermostat by address, polls it once and prints the decoded
//! status and climate view as JSON.
//!
//! Run with:
//!   cargo run --example thermostat_status -- --address AA:BB:CC:DD:EE:FF --password 1234
//!
//! Optionally pass `--email you@example.com` to tag the status request.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Manager, Peripheral};
use easytouch_ble::{
    ClimateView, Credentials, EasyTouchClient, EasyTouchPeripheral, Error, Result, Thermostat,
};
use std::sync::Arc;
use std::time::Duration;

fn arg(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

async fn find_peripheral(address: &str) -> Result<Peripheral> {
    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::transport("no Bluetooth adapter found"))?;

    adapter.start_scan(ScanFilter::default()).await?;

    for _ in 0..20 {
        for peripheral in adapter.peripherals().await? {
            if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                adapter.stop_scan().await?;
                return Ok(peripheral);
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    adapter.stop_scan().await?;
    Err(Error::ConnectionFailed {
        reason: format!("thermostat {} not found", address),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,easytouch_ble=debug")
        .init();

    let args: Vec<String> = std::env::args().collect();
    let address = arg(&args, "--address").unwrap_or_else(|| {
        eprintln!("usage: thermostat_status --address <MAC> --password <PIN> [--email <EMAIL>]");
        std::process::exit(2);
    });
    let password = arg(&args, "--password").unwrap_or_default();

    let mut credentials = Credentials::new(password);
    if let Some(email) = arg(&args, "--email") {
        credentials = credentials.with_email(email);
    }

    println!("Looking for thermostat {}...", address);
    let peripheral = find_peripheral(&address).await?;

    let client = Arc::new(EasyTouchClient::new(credentials));
    let thermostat = Thermostat::new(client, EasyTouchPeripheral::new(peripheral));

    match thermostat.refresh().await? {
        Some(status) => {
            let view = ClimateView::from_status(&status);
            let report = serde_json::json!({ "status": status, "climate": view });
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .map_err(|e| Error::Internal(e.to_string()))?
            );
        }
        None => println!("Thermostat did not answer."),
    }

    Ok(())
}
