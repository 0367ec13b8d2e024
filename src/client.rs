//! Command façade.
//!
//! Three verbs (reboot, send a command, send a command and read the reply),
//! each run under the device's gate on a fresh session that is torn down
//! when the verb returns. Transport failures never escape: verbs report
//! `bool` or `Option`.
//!
//! Each verb comes in two tiers. The plain form acquires the gate; the
//! `*_locked` form takes a [`DeviceLock`] the caller already holds, for
//! callers that need several verbs back to back without letting another
//! task in between.

use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::ble::link::ConnectableDevice;
use crate::ble::uuids::JSON_CMD_UUID;
use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, Result};
use crate::protocol::command::Command;
use crate::session::backoff::{BackoffLedger, Operation};
use crate::session::executor::GattExecutor;
use crate::session::gate::{DeviceLock, GateRegistry};
use crate::session::manager::SessionManager;
use crate::session::Session;

/// Protocol client shared by every caller talking to EasyTouch thermostats.
///
/// One client should be shared (e.g. behind an `Arc`) by all tasks of a
/// process so they share the gates and the backoff ledger.
#[derive(Debug)]
pub struct EasyTouchClient {
    executor: GattExecutor,
    gates: GateRegistry,
}

impl EasyTouchClient {
    /// Create a client with default timings.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Create a client with custom timings and a fresh ledger.
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Self {
        let ledger = Arc::new(BackoffLedger::with_max_delay(config.max_backoff));
        Self::with_ledger(credentials, config, ledger)
    }

    /// Create a client over an existing ledger.
    pub fn with_ledger(
        credentials: Credentials,
        config: ClientConfig,
        ledger: Arc<BackoffLedger>,
    ) -> Self {
        let sessions = SessionManager::new(Arc::new(config), ledger, credentials);
        Self {
            executor: GattExecutor::new(sessions),
            gates: GateRegistry::new(),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        self.executor.sessions().config()
    }

    /// The credentials in use.
    pub fn credentials(&self) -> &Credentials {
        self.executor.sessions().credentials()
    }

    /// The backoff ledger in use.
    pub fn ledger(&self) -> &Arc<BackoffLedger> {
        self.executor.sessions().ledger()
    }

    /// Wait for and take a device's gate.
    pub async fn lock(&self, device: &dyn ConnectableDevice) -> DeviceLock {
        self.gates.acquire(device.address()).await
    }

    /// Reboot the thermostat.
    #[tracing::instrument(level = "info", skip_all, fields(address = %device.address()))]
    pub async fn reboot(&self, device: &dyn ConnectableDevice) -> bool {
        let lock = self.lock(device).await;
        self.reboot_locked(&lock, device).await
    }

    /// Reboot while already holding the device's gate.
    pub async fn reboot_locked(&self, lock: &DeviceLock, device: &dyn ConnectableDevice) -> bool {
        if !lock.check(device.address()) {
            return false;
        }

        let mut session = Session::new(device);
        let outcome = self.reboot_in(&mut session).await;
        session.close().await;

        match outcome {
            Ok(()) => true,
            Err(e) => {
                error!("Error during reboot of {}: {}", device.address(), e);
                false
            }
        }
    }

    async fn reboot_in(&self, session: &mut Session<'_>) -> Result<()> {
        let sessions = self.executor.sessions();
        let address = session.address().to_string();

        sessions.ensure_ready(session).await?;
        self.ledger().wait(&address, Operation::Write).await;

        let payload = Command::reset().encode()?;
        let link = session.link().ok_or(Error::NotConnected)?;

        match link.write(JSON_CMD_UUID, &payload, true).await {
            Ok(()) => {
                info!("Reboot command sent to {}", address);
                Ok(())
            }
            Err(e) if e.is_reset_disconnect() => {
                info!("Thermostat {} is rebooting as expected", address);
                Ok(())
            }
            Err(e) => {
                self.ledger().record_failure(&address, Operation::Write);
                Err(e)
            }
        }
    }

    /// Send a command envelope.
    #[tracing::instrument(level = "info", skip_all, fields(address = %device.address()))]
    pub async fn send_command(&self, device: &dyn ConnectableDevice, command: &Command) -> bool {
        let lock = self.lock(device).await;
        self.send_command_locked(&lock, device, command).await
    }

    /// Send a command while already holding the device's gate.
    pub async fn send_command_locked(
        &self,
        lock: &DeviceLock,
        device: &dyn ConnectableDevice,
        command: &Command,
    ) -> bool {
        if !lock.check(device.address()) {
            return false;
        }

        let mut session = Session::new(device);
        let outcome = self.send_command_in(lock, &mut session, command).await;
        session.close().await;

        match outcome {
            Ok(sent) => sent,
            Err(e) => {
                error!("Error sending command to {}: {}", device.address(), e);
                false
            }
        }
    }

    async fn send_command_in(
        &self,
        lock: &DeviceLock,
        session: &mut Session<'_>,
        command: &Command,
    ) -> Result<bool> {
        self.executor.sessions().ensure_ready(session).await?;

        let payload = command.encode()?;
        debug!("Sending {} byte command", payload.len());

        Ok(self
            .executor
            .write(lock, session, JSON_CMD_UUID, &payload)
            .await)
    }

    /// Send a command and read the reply on one connection.
    #[tracing::instrument(level = "info", skip_all, fields(address = %device.address()))]
    pub async fn send_command_and_read(
        &self,
        device: &dyn ConnectableDevice,
        command: &Command,
        read_characteristic: Uuid,
    ) -> Option<Vec<u8>> {
        let lock = self.lock(device).await;
        self.send_command_and_read_locked(&lock, device, command, read_characteristic)
            .await
    }

    /// Send a command and read the reply while already holding the device's gate.
    pub async fn send_command_and_read_locked(
        &self,
        lock: &DeviceLock,
        device: &dyn ConnectableDevice,
        command: &Command,
        read_characteristic: Uuid,
    ) -> Option<Vec<u8>> {
        if !lock.check(device.address()) {
            return None;
        }

        let mut session = Session::new(device);
        let outcome = self
            .send_command_and_read_in(lock, &mut session, command, read_characteristic)
            .await;
        session.close().await;

        match outcome {
            Ok(data) => data,
            Err(e) => {
                error!("Error in send_command_and_read on {}: {}", device.address(), e);
                None
            }
        }
    }

    async fn send_command_and_read_in(
        &self,
        lock: &DeviceLock,
        session: &mut Session<'_>,
        command: &Command,
        read_characteristic: Uuid,
    ) -> Result<Option<Vec<u8>>> {
        self.executor.sessions().ensure_ready(session).await?;

        let payload = command.encode()?;
        if !self
            .executor
            .write(lock, session, JSON_CMD_UUID, &payload)
            .await
        {
            return Ok(None);
        }

        tokio::time::sleep(self.config().command_settle).await;

        let address = session.address().to_string();
        self.ledger().wait(&address, Operation::Read).await;

        let link = session.link().ok_or(Error::NotConnected)?;
        match link.read(read_characteristic).await {
            Ok(data) => {
                self.ledger().record_success(&address, Operation::Read);
                debug!("Read {} byte reply from {}", data.len(), read_characteristic);
                Ok(Some(data))
            }
            Err(e) => {
                debug!("GATT read of {} failed: {}", read_characteristic, e);
                self.ledger().record_failure(&address, Operation::Read);
                Ok(None)
            }
        }
    }
}
