//! Client configuration.
//!
//! Timing constants for connecting, authenticating and talking to the
//! thermostat, plus the credentials used to unlock it.

use std::time::Duration;

use crate::session::backoff::Operation;
use crate::session::retry::{Backoff, RetryPolicy};

/// Credentials used to unlock the thermostat.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Shared-secret password written to the password characteristic.
    pub password: String,
    /// Account e-mail carried in status requests, if configured.
    pub email: Option<String>,
}

impl Credentials {
    /// Create credentials with a password and no e-mail.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            email: None,
        }
    }

    /// Attach the account e-mail.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Timing and retry parameters for a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Bound on a single transport connection attempt.
    pub connect_timeout: Duration,
    /// Transport-level connection attempts for recoverable errors.
    pub connect_attempts: u32,
    /// Pause between transport-level connection attempts.
    pub connect_retry_delay: Duration,
    /// Wait for the service table to populate after connecting.
    pub services_settle: Duration,
    /// Authentication attempts.
    pub auth_attempts: u32,
    /// Fixed delay between authentication attempts.
    pub auth_retry_delay: Duration,
    /// Wait before re-checking a link that looks disconnected during authentication.
    pub auth_reconnect_wait: Duration,
    /// Wait after reconnecting during authentication.
    pub auth_post_connect_wait: Duration,
    /// Wait after an explicit service rediscovery.
    pub discovery_settle: Duration,
    /// Attempts per GATT read or write.
    pub gatt_attempts: u32,
    /// Time the device needs to process a command before its response is read.
    pub command_settle: Duration,
    /// Ceiling of the adaptive backoff delay.
    pub max_backoff: Duration,
    /// Wait after a successful change command before refreshing status.
    pub post_change_refresh_delay: Duration,
    /// Minimum spacing of advertisement-triggered refreshes.
    pub advertisement_debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            connect_attempts: 7,
            connect_retry_delay: Duration::from_millis(250),
            services_settle: Duration::from_secs(2),
            auth_attempts: 3,
            auth_retry_delay: Duration::from_secs(2),
            auth_reconnect_wait: Duration::from_secs(1),
            auth_post_connect_wait: Duration::from_millis(500),
            discovery_settle: Duration::from_secs(1),
            gatt_attempts: 3,
            command_settle: Duration::from_millis(500),
            max_backoff: Duration::from_secs(6),
            post_change_refresh_delay: Duration::from_secs(1),
            advertisement_debounce: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Set the connection parameters.
    pub fn with_connect_params(mut self, attempts: u32, timeout: Duration) -> Self {
        self.connect_attempts = attempts.max(1);
        self.connect_timeout = timeout;
        self
    }

    /// Set the authentication parameters.
    pub fn with_auth_params(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.auth_attempts = attempts.max(1);
        self.auth_retry_delay = retry_delay;
        self
    }

    /// Set the number of attempts per GATT read or write.
    pub fn with_gatt_attempts(mut self, attempts: u32) -> Self {
        self.gatt_attempts = attempts.max(1);
        self
    }

    /// Set the command settle delay.
    pub fn with_command_settle(mut self, settle: Duration) -> Self {
        self.command_settle = settle;
        self
    }

    /// Set the backoff ceiling.
    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max;
        self
    }

    /// Set the advertisement debounce window.
    pub fn with_advertisement_debounce(mut self, window: Duration) -> Self {
        self.advertisement_debounce = window;
        self
    }

    /// Retry policy for an operation kind.
    pub fn retry_policy(&self, operation: Operation) -> RetryPolicy {
        match operation {
            Operation::Connect => {
                RetryPolicy::new(self.connect_attempts, Backoff::Fixed(self.connect_retry_delay))
            }
            Operation::Auth => {
                RetryPolicy::new(self.auth_attempts, Backoff::Fixed(self.auth_retry_delay))
            }
            Operation::Read | Operation::Write => {
                RetryPolicy::new(self.gatt_attempts, Backoff::Ledger(operation))
            }
        }
    }
}
