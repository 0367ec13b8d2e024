//! GATT reads and writes with retry, adaptive delay and reconnection.
//!
//! Every operation here requires the caller to hold the device's gate,
//! proven by a [`DeviceLock`]. The executor never takes the gate itself and
//! fails the operation when handed another device's lock.

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::session::backoff::Operation;
use crate::session::gate::DeviceLock;
use crate::session::manager::SessionManager;
use crate::session::retry::{Backoff, RetryPolicy};
use crate::session::Session;

/// Performs characteristic writes and reads against a session.
#[derive(Debug, Clone)]
pub struct GattExecutor {
    sessions: SessionManager,
}

impl GattExecutor {
    /// Create an executor over a session manager.
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    /// The session manager used for reconnection.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Write with the configured number of attempts.
    pub async fn write(
        &self,
        lock: &DeviceLock,
        session: &mut Session<'_>,
        characteristic: Uuid,
        payload: &[u8],
    ) -> bool {
        let retries = self.sessions.config().gatt_attempts;
        self.write_with_retries(lock, session, characteristic, payload, retries)
            .await
    }

    /// Write a characteristic (with response), retrying transport errors.
    ///
    /// A failed reconnection ends the call immediately.
    pub async fn write_with_retries(
        &self,
        lock: &DeviceLock,
        session: &mut Session<'_>,
        characteristic: Uuid,
        payload: &[u8],
        retries: u32,
    ) -> bool {
        if !lock.check(session.address()) {
            return false;
        }

        let policy = RetryPolicy::new(retries, Backoff::Ledger(Operation::Write));
        let ledger = self.sessions.ledger().clone();
        let address = session.address().to_string();
        let mut last_error = None;

        for attempt in policy.attempts() {
            if !self.ensure_session(session).await {
                return false;
            }

            policy.pause_before(attempt, &ledger, &address).await;

            let result = match session.link() {
                Some(link) => link.write(characteristic, payload, true).await,
                None => return false,
            };

            match result {
                Ok(()) => {
                    ledger.record_success(&address, Operation::Write);
                    return true;
                }
                Err(e) if e.is_transport() => {
                    let delay = ledger.record_failure(&address, Operation::Write);
                    debug!(
                        "GATT write to {} failed, attempt {}/{}. Delay: {:.1}s",
                        characteristic, attempt, policy.max_attempts, delay
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("GATT write to {} failed: {}", characteristic, e);
                    return false;
                }
            }
        }

        error!(
            "GATT write to {} failed after {} attempts: {}",
            characteristic,
            policy.max_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        );
        false
    }

    /// Read with the configured number of attempts.
    pub async fn read(
        &self,
        lock: &DeviceLock,
        session: &mut Session<'_>,
        characteristic: Uuid,
    ) -> Option<Vec<u8>> {
        let retries = self.sessions.config().gatt_attempts;
        self.read_with_retries(lock, session, characteristic, retries)
            .await
    }

    /// Read a characteristic, retrying transport errors.
    ///
    /// A failed reconnection ends the call immediately.
    pub async fn read_with_retries(
        &self,
        lock: &DeviceLock,
        session: &mut Session<'_>,
        characteristic: Uuid,
        retries: u32,
    ) -> Option<Vec<u8>> {
        if !lock.check(session.address()) {
            return None;
        }

        let policy = RetryPolicy::new(retries, Backoff::Ledger(Operation::Read));
        let ledger = self.sessions.ledger().clone();
        let address = session.address().to_string();
        let mut last_error = None;

        for attempt in policy.attempts() {
            if !self.ensure_session(session).await {
                return None;
            }

            policy.pause_before(attempt, &ledger, &address).await;

            let result = session.link()?.read(characteristic).await;

            match result {
                Ok(data) => {
                    ledger.record_success(&address, Operation::Read);
                    return Some(data);
                }
                Err(e) if e.is_transport() => {
                    let delay = ledger.record_failure(&address, Operation::Read);
                    debug!(
                        "GATT read of {} failed, attempt {}/{}. Delay: {:.1}s",
                        characteristic, attempt, policy.max_attempts, delay
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("GATT read of {} failed: {}", characteristic, e);
                    return None;
                }
            }
        }

        error!(
            "GATT read of {} failed after {} attempts: {}",
            characteristic,
            policy.max_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        );
        None
    }

    async fn ensure_session(&self, session: &mut Session<'_>) -> bool {
        if session.is_live().await && session.is_authenticated() {
            return true;
        }

        if self.sessions.reconnect_and_authenticate(session).await {
            true
        } else {
            warn!("Could not re-establish session with {}", session.address());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::link::{ConnectableDevice, GattLink, MockGattLink};
    use crate::ble::uuids::{JSON_CMD_UUID, JSON_RETURN_UUID, PASSWORD_CMD_UUID};
    use crate::config::{ClientConfig, Credentials};
    use crate::error::{Error, Result};
    use crate::session::backoff::BackoffLedger;
    use crate::session::gate::GateRegistry;
    use crate::test_support::{FakeDevice, Step, SAMPLE_STATUS};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct MockDevice(Mutex<Option<MockGattLink>>);

    #[async_trait]
    impl ConnectableDevice for MockDevice {
        fn address(&self) -> &str {
            "mock"
        }

        async fn connect(&self) -> Result<Box<dyn GattLink>> {
            match self.0.lock().take() {
                Some(link) => Ok(Box::new(link)),
                None => Err(Error::transport("no more links")),
            }
        }
    }

    fn connected_mock() -> MockGattLink {
        let mut link = MockGattLink::new();
        link.expect_is_connected().returning(|| true);
        link.expect_has_services().returning(|| true);
        link.expect_disconnect().returning(|| Ok(()));
        link.expect_write()
            .withf(|uuid, _, _| *uuid == PASSWORD_CMD_UUID)
            .times(1)
            .returning(|_, _, _| Ok(()));
        link
    }

    fn executor(ledger: Arc<BackoffLedger>) -> GattExecutor {
        GattExecutor::new(SessionManager::new(
            Arc::new(ClientConfig::default()),
            ledger,
            Credentials::new("1234"),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_gives_up_after_three_transport_errors() {
        let mut link = connected_mock();
        link.expect_write()
            .withf(|uuid, _, _| *uuid == JSON_CMD_UUID)
            .times(3)
            .returning(|_, _, _| Err(Error::transport("GATT busy")));

        let device = MockDevice(Mutex::new(Some(link)));
        let ledger = Arc::new(BackoffLedger::new());
        let executor = executor(ledger.clone());
        let gates = GateRegistry::new();
        let lock = gates.acquire("mock").await;

        let mut session = Session::new(&device);
        executor.sessions().ensure_ready(&mut session).await.unwrap();

        assert!(!executor.write(&lock, &mut session, JSON_CMD_UUID, b"{}").await);
        assert_eq!(ledger.get_delay("mock", Operation::Write), 4.0);
        assert_eq!(ledger.get_delay("mock", Operation::Read), 0.0);
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_returns_payload() {
        let mut link = connected_mock();
        link.expect_read()
            .withf(|uuid| *uuid == JSON_RETURN_UUID)
            .times(1)
            .returning(|_| Ok(b"{\"SN\":1}".to_vec()));

        let device = MockDevice(Mutex::new(Some(link)));
        let executor = executor(Arc::new(BackoffLedger::new()));
        let gates = GateRegistry::new();
        let lock = gates.acquire("mock").await;

        let mut session = Session::new(&device);
        executor.sessions().ensure_ready(&mut session).await.unwrap();

        let data = executor.read(&lock, &mut session, JSON_RETURN_UUID).await;
        assert_eq!(data, Some(b"{\"SN\":1}".to_vec()));
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_reconnects_dropped_link() {
        let device = FakeDevice::new("dev");
        let executor = executor(Arc::new(BackoffLedger::new()));
        let gates = GateRegistry::new();
        let lock = gates.acquire("dev").await;

        let mut session = Session::new(&device);
        executor.sessions().ensure_ready(&mut session).await.unwrap();
        device.drop_links();

        assert!(executor.write(&lock, &mut session, JSON_CMD_UUID, b"{}").await);
        assert_eq!(device.connect_count(), 2);
        assert_eq!(device.password_writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconnect_is_terminal() {
        let device = FakeDevice::new("dev");
        let ledger = Arc::new(BackoffLedger::new());
        let executor = executor(ledger.clone());
        let gates = GateRegistry::new();
        let lock = gates.acquire("dev").await;

        let mut session = Session::new(&device);
        executor.sessions().ensure_ready(&mut session).await.unwrap();
        device.drop_links();
        device.script_connects(std::iter::repeat(Step::Fail("out of range")).take(7));

        assert!(!executor.write(&lock, &mut session, JSON_CMD_UUID, b"{}").await);
        assert!(device.command_writes().is_empty());
        assert_eq!(ledger.get_delay("dev", Operation::Connect), 1.0);
        assert_eq!(ledger.get_delay("dev", Operation::Write), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_recovers_from_transient_error() {
        let device = FakeDevice::new("dev");
        device.script_reads([Step::Fail("GATT error 19")]);
        let ledger = Arc::new(BackoffLedger::new());
        let executor = executor(ledger.clone());
        let gates = GateRegistry::new();
        let lock = gates.acquire("dev").await;

        let mut session = Session::new(&device);
        executor.sessions().ensure_ready(&mut session).await.unwrap();

        let data = executor.read(&lock, &mut session, JSON_RETURN_UUID).await;
        assert_eq!(data.as_deref(), Some(SAMPLE_STATUS.as_bytes()));

        let entry = ledger.entry("dev", Operation::Read).unwrap();
        assert_eq!(entry.failures, 0);
        assert!((entry.delay_secs - 0.75).abs() < 1e-9);
        assert_eq!(ledger.get_delay("dev", Operation::Write), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_lock_fails_without_radio_traffic() {
        let device = FakeDevice::new("dev");
        let executor = executor(Arc::new(BackoffLedger::new()));
        let gates = GateRegistry::new();
        let other = gates.acquire("other").await;

        let mut session = Session::new(&device);
        assert!(!executor.write(&other, &mut session, JSON_CMD_UUID, b"{}").await);
        assert!(executor.read(&other, &mut session, JSON_RETURN_UUID).await.is_none());
        assert_eq!(device.connect_attempts(), 0);
        assert!(device.events().is_empty());
    }
}
