//! Session establishment: connect, authenticate, reconnect.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ble::link::{ConnectableDevice, GattLink};
use crate::ble::uuids::PASSWORD_CMD_UUID;
use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, Result};
use crate::session::backoff::{BackoffLedger, Operation};
use crate::session::Session;

/// Produces connected, authenticated sessions or fails explicitly.
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<ClientConfig>,
    ledger: Arc<BackoffLedger>,
    credentials: Credentials,
}

impl SessionManager {
    /// Create a session manager.
    pub fn new(
        config: Arc<ClientConfig>,
        ledger: Arc<BackoffLedger>,
        credentials: Credentials,
    ) -> Self {
        Self {
            config,
            ledger,
            credentials,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The backoff ledger in use.
    pub fn ledger(&self) -> &Arc<BackoffLedger> {
        &self.ledger
    }

    /// The credentials in use.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Open a connection, retrying recoverable transport errors.
    ///
    /// Each attempt is bounded by the connect timeout. A link whose service
    /// table is still empty after the settle wait fails with
    /// [`Error::ServicesUnavailable`] and is not retried.
    pub async fn connect(&self, device: &dyn ConnectableDevice) -> Result<Box<dyn GattLink>> {
        let policy = self.config.retry_policy(Operation::Connect);
        let address = device.address();

        for attempt in policy.attempts() {
            policy.pause_before(attempt, &self.ledger, address).await;
            debug!(
                "Connection attempt {} of {} to {}",
                attempt, policy.max_attempts, address
            );

            match self.connect_once(device).await {
                Ok(link) => return Ok(link),
                Err(e) if e.is_recoverable_connect() && policy.has_next(attempt) => {
                    warn!("Connection attempt {} to {} failed: {}", attempt, address, e);
                }
                Err(Error::ServicesUnavailable) => {
                    error!("No services available on {} after connecting", address);
                    return Err(Error::ServicesUnavailable);
                }
                Err(e) => {
                    error!("Connection to {} failed: {}", address, e);
                    return Err(Error::ConnectionFailed {
                        reason: format!("{} (after {} attempts)", e, attempt),
                    });
                }
            }
        }

        Err(Error::ConnectionFailed {
            reason: format!("Failed after {} attempts", policy.max_attempts),
        })
    }

    async fn connect_once(&self, device: &dyn ConnectableDevice) -> Result<Box<dyn GattLink>> {
        let link = tokio::time::timeout(self.config.connect_timeout, device.connect())
            .await
            .map_err(|_| Error::ConnectTimeout)??;

        if !link.has_services() {
            tokio::time::sleep(self.config.services_settle).await;
        }

        if !link.has_services() {
            if let Err(e) = link.disconnect().await {
                debug!("Error disconnecting link without services: {}", e);
            }
            return Err(Error::ServicesUnavailable);
        }

        Ok(link)
    }

    /// Write the password, retrying with a fixed delay.
    ///
    /// Returns `false` once the attempts are exhausted. A transport error
    /// during an attempt tears the session's link down.
    pub async fn authenticate(&self, session: &mut Session<'_>) -> bool {
        let policy = self.config.retry_policy(Operation::Auth);
        let address = session.address().to_string();

        for attempt in policy.attempts() {
            policy.pause_before(attempt, &self.ledger, &address).await;

            match self.authenticate_once(session).await {
                Ok(()) => {
                    session.mark_authenticated(true);
                    debug!(
                        "Authentication with {} successful on attempt {}/{}",
                        address, attempt, policy.max_attempts
                    );
                    return true;
                }
                Err(e) => {
                    debug!(
                        "Authentication attempt {}/{} with {} failed: {}",
                        attempt, policy.max_attempts, address, e
                    );
                }
            }
        }

        error!(
            "Authentication with {} failed after {} attempts",
            address, policy.max_attempts
        );
        session.mark_authenticated(false);
        false
    }

    async fn authenticate_once(&self, session: &mut Session<'_>) -> Result<()> {
        if !session.is_live().await {
            tokio::time::sleep(self.config.auth_reconnect_wait).await;

            if !session.is_live().await {
                session.close().await;
                let link = self.connect(session.device()).await?;
                session.attach(link);
                tokio::time::sleep(self.config.auth_post_connect_wait).await;
            }

            if !session.is_live().await {
                error!("Thermostat {} not connected after reconnecting", session.address());
                return Err(Error::NotConnected);
            }
        }

        let result = match session.link() {
            Some(link) => self.write_password(link).await,
            None => Err(Error::NotConnected),
        };

        if let Err(e) = &result {
            if e.is_transport() {
                error!("Authentication with {} failed: {}", session.address(), e);
                session.close().await;
            }
        }

        result
    }

    async fn write_password(&self, link: &dyn GattLink) -> Result<()> {
        if !link.has_services() {
            link.discover_services().await?;
            tokio::time::sleep(self.config.discovery_settle).await;

            if !link.has_services() {
                return Err(Error::ServicesUnavailable);
            }
        }

        link.write(
            PASSWORD_CMD_UUID,
            self.credentials.password.as_bytes(),
            true,
        )
        .await?;

        debug!("Password sent");
        Ok(())
    }

    /// Make sure the session holds a connected, authenticated link.
    ///
    /// Connects fresh when needed. Does not touch the ledger.
    pub async fn ensure_ready(&self, session: &mut Session<'_>) -> Result<()> {
        if !session.is_live().await {
            session.close().await;
            let link = self.connect(session.device()).await?;
            session.attach(link);
            info!("Connected to thermostat {}", session.address());
        }

        if session.is_authenticated() {
            return Ok(());
        }

        if self.authenticate(session).await {
            info!("Authenticated with thermostat {}", session.address());
            Ok(())
        } else {
            Err(Error::AuthenticationFailed {
                reason: format!(
                    "password rejected or link lost after {} attempts",
                    self.config.auth_attempts
                ),
            })
        }
    }

    /// Reconnect and re-authenticate with ledger-driven delays.
    ///
    /// Connect and auth are tracked as separate ledger operations.
    pub async fn reconnect_and_authenticate(&self, session: &mut Session<'_>) -> bool {
        let address = session.address().to_string();

        self.ledger.wait(&address, Operation::Connect).await;
        session.close().await;

        match self.connect(session.device()).await {
            Ok(link) => session.attach(link),
            Err(e) => {
                warn!("Reconnection to {} failed: {}", address, e);
                self.ledger.record_failure(&address, Operation::Connect);
                return false;
            }
        }

        if !session.is_live().await {
            self.ledger.record_failure(&address, Operation::Connect);
            return false;
        }
        self.ledger.record_success(&address, Operation::Connect);

        self.ledger.wait(&address, Operation::Auth).await;
        if self.authenticate(session).await {
            self.ledger.record_success(&address, Operation::Auth);
            true
        } else {
            self.ledger.record_failure(&address, Operation::Auth);
            false
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeDevice, Step};
    use std::time::Duration;

    fn manager(ledger: Arc<BackoffLedger>) -> SessionManager {
        SessionManager::new(
            Arc::new(ClientConfig::default()),
            ledger,
            Credentials::new("1234"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_recoverable_errors() {
        let device = FakeDevice::new("dev");
        device.script_connects([Step::Fail("le-connection-abort"), Step::Fail("busy"), Step::Ok]);
        let manager = manager(Arc::new(BackoffLedger::new()));

        let link = manager.connect(&device).await;
        assert!(link.is_ok());
        assert_eq!(device.connect_attempts(), 3);
        assert_eq!(device.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_gives_up_after_seven_attempts() {
        let device = FakeDevice::new("dev");
        device.script_connects(std::iter::repeat(Step::Fail("unreachable")).take(10));
        let manager = manager(Arc::new(BackoffLedger::new()));

        let result = manager.connect(&device).await;
        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
        assert_eq!(device.connect_attempts(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out_hung_attempt() {
        let device = FakeDevice::new("dev");
        device.script_connects([Step::Hang, Step::Ok]);
        let manager = manager(Arc::new(BackoffLedger::new()));

        let start = tokio::time::Instant::now();
        assert!(manager.connect(&device).await.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(20));
        assert_eq!(device.connect_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_without_services_fails() {
        let device = FakeDevice::new("dev").without_services();
        let manager = manager(Arc::new(BackoffLedger::new()));

        let result = manager.connect(&device).await;
        assert!(matches!(result, Err(Error::ServicesUnavailable)));
        assert_eq!(device.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_writes_password() {
        let device = FakeDevice::new("dev");
        let manager = manager(Arc::new(BackoffLedger::new()));
        let mut session = Session::new(&device);

        assert!(manager.reconnect_and_authenticate(&mut session).await);
        assert!(session.is_authenticated());
        assert_eq!(device.password_writes(), vec![b"1234".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_gives_up_after_three_attempts() {
        let device = FakeDevice::new("dev");
        device.script_writes(std::iter::repeat(Step::Fail("auth rejected")).take(5));
        let ledger = Arc::new(BackoffLedger::new());
        let manager = manager(ledger.clone());
        let mut session = Session::new(&device);
        session.attach(manager.connect(&device).await.unwrap());

        assert!(!manager.authenticate(&mut session).await);
        assert!(!session.is_authenticated());
        assert_eq!(device.password_writes().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_failure_records_connect_failure_only() {
        let device = FakeDevice::new("dev");
        device.script_connects(std::iter::repeat(Step::Fail("gone")).take(7));
        let ledger = Arc::new(BackoffLedger::new());
        let manager = manager(ledger.clone());
        let mut session = Session::new(&device);

        assert!(!manager.reconnect_and_authenticate(&mut session).await);
        assert_eq!(ledger.get_delay("dev", Operation::Connect), 1.0);
        assert_eq!(ledger.get_delay("dev", Operation::Auth), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_auth_records_auth_failure() {
        let device = FakeDevice::new("dev");
        device.script_writes(std::iter::repeat(Step::Fail("rejected")).take(3));
        let ledger = Arc::new(BackoffLedger::new());
        let manager = manager(ledger.clone());
        let mut session = Session::new(&device);

        assert!(!manager.reconnect_and_authenticate(&mut session).await);
        assert_eq!(ledger.get_delay("dev", Operation::Auth), 1.0);
        assert_eq!(ledger.get_delay("dev", Operation::Connect), 0.0);
    }
}
