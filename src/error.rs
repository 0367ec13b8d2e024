//! Error types for the easytouch-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// A GATT read or write failed mid-operation.
    #[error("Transport error: {message}")]
    Transport {
        /// Message reported by the transport.
        message: String,
    },

    /// Failed to establish a connection to the thermostat.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// A single connection attempt did not finish within the connect timeout.
    #[error("Connection attempt timed out")]
    ConnectTimeout,

    /// The GATT service table was still empty after connecting.
    #[error("No GATT services available after connecting")]
    ServicesUnavailable,

    /// The password write failed or authentication retries were exhausted.
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Description of why authentication failed.
        reason: String,
    },

    /// Operation requires a connection but the session has none.
    #[error("Thermostat not connected")]
    NotConnected,

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// The status payload could not be decoded.
    #[error("Malformed payload: {context}")]
    MalformedPayload {
        /// Description of what was wrong with the payload.
        context: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a transport error from any displayable message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Build a malformed payload error.
    pub fn malformed(context: impl Into<String>) -> Self {
        Self::MalformedPayload {
            context: context.into(),
        }
    }

    /// Whether this error came from the radio link rather than from the
    /// protocol layer. Retry loops absorb these.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth(_)
                | Self::Transport { .. }
                | Self::NotConnected
                | Self::CharacteristicNotFound { .. }
                | Self::ConnectTimeout
        )
    }

    /// Whether a failed connection attempt may be retried at the transport layer.
    pub fn is_recoverable_connect(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth(_)
                | Self::Transport { .. }
                | Self::ConnectionFailed { .. }
                | Self::ConnectTimeout
        )
    }

    /// Whether the link dropped because the device is resetting (GATT status 133).
    pub fn is_reset_disconnect(&self) -> bool {
        self.is_transport() && self.to_string().contains("133")
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
