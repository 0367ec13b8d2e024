//! High-level handle for a single thermostat.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ble::link::ConnectableDevice;
use crate::ble::uuids::JSON_RETURN_UUID;
use crate::client::EasyTouchClient;
use crate::climate::{
    fan_mode_command, hvac_mode_command, temperature_command, ClimateView, FanPreset, HvacMode,
    TemperatureTarget,
};
use crate::error::Result;
use crate::protocol::command::{Command, DEFAULT_ZONE};
use crate::protocol::status::{decode_status, StatusRecord};

/// A thermostat bound to a shared client.
///
/// Keeps the last successfully decoded status. A failed poll leaves it
/// untouched so callers can keep showing the previous values.
pub struct Thermostat<D: ConnectableDevice> {
    client: Arc<EasyTouchClient>,
    device: D,
    state: RwLock<Option<StatusRecord>>,
    last_advertisement_refresh: Mutex<Option<Instant>>,
}

impl<D: ConnectableDevice> Thermostat<D> {
    /// Create a handle.
    pub fn new(client: Arc<EasyTouchClient>, device: D) -> Self {
        Self {
            client,
            device,
            state: RwLock::new(None),
            last_advertisement_refresh: Mutex::new(None),
        }
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Device address.
    pub fn address(&self) -> &str {
        self.device.address()
    }

    /// Last known status.
    pub fn state(&self) -> Option<StatusRecord> {
        self.state.read().clone()
    }

    /// Climate view of the last known status.
    pub fn climate(&self) -> Option<ClimateView> {
        self.state.read().as_ref().map(ClimateView::from_status)
    }

    fn hvac_mode(&self) -> HvacMode {
        self.climate().map_or(HvacMode::Off, |view| view.hvac_mode)
    }

    /// Poll the thermostat.
    ///
    /// Returns `Ok(None)` when the device could not be reached; the last
    /// known state is kept. A reply that cannot be decoded is an error.
    pub async fn refresh(&self) -> Result<Option<StatusRecord>> {
        let email = self.client.credentials().email.as_deref();
        let command = Command::get_status(DEFAULT_ZONE, email);

        let Some(payload) = self
            .client
            .send_command_and_read(&self.device, &command, JSON_RETURN_UUID)
            .await
        else {
            if self.state.read().is_some() {
                warn!("No status from {}, keeping last known state", self.address());
            } else {
                warn!("No status from {} and no previous state", self.address());
            }
            return Ok(None);
        };

        let record = decode_status(&payload)?;
        debug!(
            "Status from {}: mode={:?} current={:?} temp={}",
            self.address(),
            record.mode,
            record.current_mode,
            record.face_plate_temperature
        );
        *self.state.write() = Some(record.clone());
        Ok(Some(record))
    }

    /// Reboot the thermostat.
    pub async fn reboot(&self) -> bool {
        self.client.reboot(&self.device).await
    }

    /// Select an HVAC mode.
    ///
    /// Returns whether the change was accepted. The follow-up refresh is
    /// best effort: its failure is logged and does not change the outcome.
    pub async fn set_hvac_mode(&self, mode: HvacMode) -> bool {
        self.apply(hvac_mode_command(mode)).await
    }

    /// Apply a temperature target in the current mode.
    ///
    /// A single setpoint outside cool, heat or dry is ignored and reports `false`.
    pub async fn set_temperature(&self, target: TemperatureTarget) -> bool {
        let mode = self.hvac_mode();
        match temperature_command(mode, target) {
            Some(command) => self.apply(command).await,
            None => {
                warn!("Mode {:?} has no setpoint for {:?}", mode, target);
                false
            }
        }
    }

    /// Apply a fan preset in the current mode.
    pub async fn set_fan_mode(&self, preset: FanPreset) -> bool {
        let mode = self.hvac_mode();
        match fan_mode_command(mode, preset) {
            Some(command) => self.apply(command).await,
            None => {
                warn!("Mode {:?} has no fan setting", mode);
                false
            }
        }
    }

    async fn apply(&self, command: Command) -> bool {
        if !self.client.send_command(&self.device, &command).await {
            return false;
        }

        tokio::time::sleep(self.client.config().post_change_refresh_delay).await;
        if let Err(e) = self.refresh().await {
            error!("Refresh of {} after change failed: {}", self.address(), e);
        }
        true
    }

    /// Whether an advertisement should trigger a poll, arming the debounce if so.
    pub fn should_refresh_on_advertisement(&self) -> bool {
        let debounce = self.client.config().advertisement_debounce;
        let mut last = self.last_advertisement_refresh.lock();
        let now = Instant::now();

        match *last {
            Some(at) if now.duration_since(at) < debounce => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// React to an advertisement from this thermostat.
    pub async fn handle_advertisement(&self) -> Result<Option<StatusRecord>> {
        if !self.should_refresh_on_advertisement() {
            debug!("Advertisement from {} debounced", self.address());
            return Ok(None);
        }

        info!("Advertisement from {}, refreshing", self.address());
        self.refresh().await
    }
}

impl<D: ConnectableDevice> std::fmt::Debug for Thermostat<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thermostat")
            .field("address", &self.address())
            .field("state", &*self.state.read())
            .finish()
    }
}
