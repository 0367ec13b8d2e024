//! Status envelope decoding.
//!
//! The return characteristic carries a JSON object:
//!
//! ```json
//! {"SN": "...", "Z_sts": {"0": [v0, v1, ..., v15, ...]}, "PRM": [flags...]}
//! ```
//!
//! `Z_sts["0"]` is positional:
//!
//! | index | field                  |
//! |-------|------------------------|
//! | 0     | auto heat setpoint     |
//! | 1     | auto cool setpoint     |
//! | 2     | cool setpoint          |
//! | 3     | heat setpoint          |
//! | 4     | dry setpoint           |
//! | 6     | fan-only fan number    |
//! | 7     | cool fan number        |
//! | 9     | auto fan number        |
//! | 10    | configured mode number |
//! | 11    | heat fan number        |
//! | 12    | face-plate temperature |
//! | 15    | live mode number       |
//!
//! `PRM` flag 7 means explicitly off, flag 15 explicitly on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::modes::{FanSpeed, OperatingMode};

/// Minimum length of the zone status array.
pub const MIN_ZONE_FIELDS: usize = 16;

/// `PRM` flag meaning the unit is explicitly off.
pub const PARAM_OFF_FLAG: i64 = 7;

/// `PRM` flag meaning the unit is explicitly on.
pub const PARAM_ON_FLAG: i64 = 15;

const IDX_AUTO_HEAT_SP: usize = 0;
const IDX_AUTO_COOL_SP: usize = 1;
const IDX_COOL_SP: usize = 2;
const IDX_HEAT_SP: usize = 3;
const IDX_DRY_SP: usize = 4;
const IDX_FAN_ONLY_FAN: usize = 6;
const IDX_COOL_FAN: usize = 7;
const IDX_AUTO_FAN: usize = 9;
const IDX_MODE: usize = 10;
const IDX_HEAT_FAN: usize = 11;
const IDX_FACE_PLATE_TEMP: usize = 12;
const IDX_CURRENT_MODE: usize = 15;

#[derive(Deserialize)]
struct StatusEnvelope {
    #[serde(rename = "SN")]
    serial_number: Value,
    #[serde(rename = "Z_sts")]
    zones: HashMap<String, Vec<Value>>,
    #[serde(rename = "PRM")]
    params: Vec<Value>,
}

/// Decoded thermostat status.
///
/// Exactly one of the `*fan_mode` fields is populated, chosen by the
/// configured mode; none when the configured mode is off or unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    /// Serial number as reported.
    #[serde(rename = "SN")]
    pub serial_number: String,
    /// Lower bound of the auto range.
    #[serde(rename = "autoHeat_sp")]
    pub auto_heat_sp: i64,
    /// Upper bound of the auto range.
    #[serde(rename = "autoCool_sp")]
    pub auto_cool_sp: i64,
    /// Cool setpoint.
    pub cool_sp: i64,
    /// Heat setpoint.
    pub heat_sp: i64,
    /// Dry setpoint.
    pub dry_sp: i64,
    /// Fan number used in fan-only mode.
    pub fan_mode_num: i64,
    /// Fan number used in cool mode.
    pub cool_fan_mode_num: i64,
    /// Fan number used in auto mode.
    pub auto_fan_mode_num: i64,
    /// Fan number used in heat mode.
    pub heat_fan_mode_num: i64,
    /// Configured mode number; survives idle periods.
    pub mode_num: i64,
    /// Live operating mode number; 0 means the unit is off.
    pub current_mode_num: i64,
    /// Configured mode, when the number is in the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<OperatingMode>,
    /// Live mode, when the number is in the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_mode: Option<OperatingMode>,
    /// Face-plate temperature (°F).
    #[serde(rename = "facePlateTemperature")]
    pub face_plate_temperature: i64,
    /// `PRM` carried the explicit-off flag.
    pub off: bool,
    /// `PRM` carried the explicit-on flag.
    pub on: bool,
    /// Fan setting in fan-only mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_mode: Option<FanSpeed>,
    /// Fan setting in cool mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cool_fan_mode: Option<FanSpeed>,
    /// Fan setting in heat mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_fan_mode: Option<FanSpeed>,
    /// Fan setting in auto mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_fan_mode: Option<FanSpeed>,
    /// The parsed envelope, for diagnostics.
    #[serde(rename = "ALL")]
    pub raw: Value,
}

impl StatusRecord {
    /// Whether the live state is off. A live mode of 0 wins over the configured mode.
    pub fn is_off(&self) -> bool {
        self.current_mode_num == 0
    }

    /// Fan setting of the configured mode, if any.
    pub fn active_fan_mode(&self) -> Option<FanSpeed> {
        self.fan_mode
            .or(self.cool_fan_mode)
            .or(self.heat_fan_mode)
            .or(self.auto_fan_mode)
    }
}

/// Decode a status payload.
///
/// Pure: the same bytes always produce the same record.
pub fn decode_status(data: &[u8]) -> Result<StatusRecord> {
    trace!("Decoding {} byte status payload", data.len());

    let raw: Value = serde_json::from_slice(data)
        .map_err(|e| Error::malformed(format!("status is not valid JSON: {}", e)))?;

    let envelope: StatusEnvelope = serde_json::from_value(raw.clone())
        .map_err(|e| Error::malformed(format!("status envelope: {}", e)))?;

    let info = envelope
        .zones
        .get("0")
        .ok_or_else(|| Error::malformed("Z_sts has no zone \"0\""))?;

    if info.len() < MIN_ZONE_FIELDS {
        return Err(Error::malformed(format!(
            "zone status too short: {} fields (need at least {})",
            info.len(),
            MIN_ZONE_FIELDS
        )));
    }

    let field = |idx: usize| -> Result<i64> {
        let value = &info[idx];
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| Error::malformed(format!("zone field {} is not a number: {}", idx, value)))
    };

    let params: Vec<i64> = envelope.params.iter().filter_map(Value::as_i64).collect();

    let serial_number = match &envelope.serial_number {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let mode_num = field(IDX_MODE)?;
    let current_mode_num = field(IDX_CURRENT_MODE)?;
    let mode = OperatingMode::from_num(mode_num);

    let mut record = StatusRecord {
        serial_number,
        auto_heat_sp: field(IDX_AUTO_HEAT_SP)?,
        auto_cool_sp: field(IDX_AUTO_COOL_SP)?,
        cool_sp: field(IDX_COOL_SP)?,
        heat_sp: field(IDX_HEAT_SP)?,
        dry_sp: field(IDX_DRY_SP)?,
        fan_mode_num: field(IDX_FAN_ONLY_FAN)?,
        cool_fan_mode_num: field(IDX_COOL_FAN)?,
        auto_fan_mode_num: field(IDX_AUTO_FAN)?,
        heat_fan_mode_num: field(IDX_HEAT_FAN)?,
        mode_num,
        current_mode_num,
        mode,
        current_mode: OperatingMode::from_num(current_mode_num),
        face_plate_temperature: field(IDX_FACE_PLATE_TEMP)?,
        off: params.contains(&PARAM_OFF_FLAG),
        on: params.contains(&PARAM_ON_FLAG),
        fan_mode: None,
        cool_fan_mode: None,
        heat_fan_mode: None,
        auto_fan_mode: None,
        raw,
    };

    // The fan field that matters depends on the configured mode, not the live one.
    match mode {
        Some(OperatingMode::Fan) => {
            record.fan_mode = Some(FanSpeed::from_fan_only_num(record.fan_mode_num));
        }
        Some(OperatingMode::Cool) => {
            record.cool_fan_mode = Some(FanSpeed::from_full_num(record.cool_fan_mode_num));
        }
        Some(OperatingMode::Heat) => {
            record.heat_fan_mode = Some(FanSpeed::from_full_num(record.heat_fan_mode_num));
        }
        Some(OperatingMode::Auto) => {
            record.auto_fan_mode = Some(FanSpeed::from_full_num(record.auto_fan_mode_num));
        }
        _ => {}
    }

    Ok(record)
}
