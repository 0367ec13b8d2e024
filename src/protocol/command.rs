//! Outbound command envelopes.
//!
//! Commands are plain JSON objects written to the command characteristic:
//!
//! ```json
//! {"Type": "Get Status", "Zone": 0, "EM": "me@example.com", "TM": 1700000000}
//! {"Type": "Change", "Changes": {"zone": 0, "power": 1, "mode": 2}}
//! ```

use serde::Serialize;

use crate::error::{Error, Result};

/// Zone used by single-zone thermostats.
pub const DEFAULT_ZONE: u8 = 0;

/// Envelope type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandType {
    /// Apply the changes in `Changes`.
    #[serde(rename = "Change")]
    Change,
    /// Ask for a status snapshot on the return characteristic.
    #[serde(rename = "Get Status")]
    GetStatus,
}

/// Field changes carried by a `Change` envelope.
///
/// Only set fields are serialized; `zone` is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Changes {
    /// Target zone.
    pub zone: u8,
    /// 1 to power on, 0 to power off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<u8>,
    /// Operating mode number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<i64>,
    /// Cool setpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cool_sp: Option<i64>,
    /// Heat setpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_sp: Option<i64>,
    /// Dry setpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_sp: Option<i64>,
    /// Upper bound of the auto range.
    #[serde(rename = "autoCool_sp", skip_serializing_if = "Option::is_none")]
    pub auto_cool_sp: Option<i64>,
    /// Lower bound of the auto range.
    #[serde(rename = "autoHeat_sp", skip_serializing_if = "Option::is_none")]
    pub auto_heat_sp: Option<i64>,
    /// Fan number in fan-only mode.
    #[serde(rename = "fanOnly", skip_serializing_if = "Option::is_none")]
    pub fan_only: Option<i64>,
    /// Fan number in cool mode.
    #[serde(rename = "coolFan", skip_serializing_if = "Option::is_none")]
    pub cool_fan: Option<i64>,
    /// Fan number in heat mode.
    #[serde(rename = "heatFan", skip_serializing_if = "Option::is_none")]
    pub heat_fan: Option<i64>,
    /// Fan number in auto mode.
    #[serde(rename = "autoFan", skip_serializing_if = "Option::is_none")]
    pub auto_fan: Option<i64>,
    /// Reset token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<String>,
}

impl Changes {
    /// Start an empty change set for a zone.
    pub fn zone(zone: u8) -> Self {
        Self {
            zone,
            power: None,
            mode: None,
            cool_sp: None,
            heat_sp: None,
            dry_sp: None,
            auto_cool_sp: None,
            auto_heat_sp: None,
            fan_only: None,
            cool_fan: None,
            heat_fan: None,
            auto_fan: None,
            reset: None,
        }
    }

    /// Power the zone on or off.
    pub fn power(mut self, on: bool) -> Self {
        self.power = Some(u8::from(on));
        self
    }

    /// Select an operating mode number.
    pub fn mode(mut self, mode: i64) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the cool setpoint.
    pub fn cool_setpoint(mut self, value: i64) -> Self {
        self.cool_sp = Some(value);
        self
    }

    /// Set the heat setpoint.
    pub fn heat_setpoint(mut self, value: i64) -> Self {
        self.heat_sp = Some(value);
        self
    }

    /// Set the dry setpoint.
    pub fn dry_setpoint(mut self, value: i64) -> Self {
        self.dry_sp = Some(value);
        self
    }

    /// Set the auto range.
    pub fn auto_range(mut self, low: i64, high: i64) -> Self {
        self.auto_heat_sp = Some(low);
        self.auto_cool_sp = Some(high);
        self
    }

    /// Set the fan number used in fan-only mode.
    pub fn fan_only(mut self, value: i64) -> Self {
        self.fan_only = Some(value);
        self
    }

    /// Set the fan number used in cool mode.
    pub fn cool_fan(mut self, value: i64) -> Self {
        self.cool_fan = Some(value);
        self
    }

    /// Set the fan number used in heat mode.
    pub fn heat_fan(mut self, value: i64) -> Self {
        self.heat_fan = Some(value);
        self
    }

    /// Set the fan number used in auto mode.
    pub fn auto_fan(mut self, value: i64) -> Self {
        self.auto_fan = Some(value);
        self
    }

    /// Request a device reset.
    pub fn reset(mut self) -> Self {
        self.reset = Some(" OK".to_string());
        self
    }
}

/// A command envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Envelope type.
    #[serde(rename = "Type")]
    pub kind: CommandType,
    /// Top-level zone, carried by status requests.
    #[serde(rename = "Zone", skip_serializing_if = "Option::is_none")]
    pub zone: Option<u8>,
    /// Field changes.
    #[serde(rename = "Changes", skip_serializing_if = "Option::is_none")]
    pub changes: Option<Changes>,
    /// Account e-mail.
    #[serde(rename = "EM", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Unix timestamp of the request.
    #[serde(rename = "TM", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Command {
    /// Status request stamped with the current time.
    pub fn get_status(zone: u8, email: Option<&str>) -> Self {
        Self::get_status_at(zone, email, chrono::Utc::now().timestamp())
    }

    /// Status request stamped with a given unix time.
    pub fn get_status_at(zone: u8, email: Option<&str>, timestamp: i64) -> Self {
        Self {
            kind: CommandType::GetStatus,
            zone: Some(zone),
            changes: None,
            email: email.map(str::to_string),
            timestamp: Some(timestamp),
        }
    }

    /// Change request.
    pub fn change(changes: Changes) -> Self {
        Self {
            kind: CommandType::Change,
            zone: None,
            changes: Some(changes),
            email: None,
            timestamp: None,
        }
    }

    /// The fixed reset request sent by reboot.
    pub fn reset() -> Self {
        Self::change(Changes::zone(DEFAULT_ZONE).reset())
    }

    /// Serialize to the UTF-8 JSON written on the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("Failed to encode command: {}", e)))
    }
}

/// Serialize a command envelope to the bytes written on the command characteristic.
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    command.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn encoded(command: &Command) -> Value {
        serde_json::from_slice(&command.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_reset_envelope() {
        assert_eq!(
            encoded(&Command::reset()),
            json!({"Type": "Change", "Changes": {"zone": 0, "reset": " OK"}})
        );
    }

    #[test]
    fn test_get_status_envelope() {
        let command = Command::get_status_at(0, Some("me@example.com"), 1_700_000_000);
        assert_eq!(
            encoded(&command),
            json!({"Type": "Get Status", "Zone": 0, "EM": "me@example.com", "TM": 1_700_000_000})
        );
    }

    #[test]
    fn test_get_status_without_email() {
        let value = encoded(&Command::get_status(0, None));
        assert!(value.get("EM").is_none());
        assert!(value["TM"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_change_vocabulary() {
        let changes = Changes::zone(0)
            .power(true)
            .mode(11)
            .auto_range(68, 76)
            .auto_fan(128);
        assert_eq!(
            encoded(&Command::change(changes)),
            json!({
                "Type": "Change",
                "Changes": {
                    "zone": 0,
                    "power": 1,
                    "mode": 11,
                    "autoCool_sp": 76,
                    "autoHeat_sp": 68,
                    "autoFan": 128
                }
            })
        );
    }

    #[test]
    fn test_encoding_is_compact_utf8() {
        let bytes = Command::change(Changes::zone(0).power(false)).encode().unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text, r#"{"Type":"Change","Changes":{"zone":0,"power":0}}"#);
        assert_eq!(
            encode_command(&Command::change(Changes::zone(0).power(false))).unwrap(),
            bytes
        );
    }
}
