//! Home-automation climate view over a decoded status record.
//!
//! Maps the device's operating modes and fan tables onto a small standard
//! vocabulary (HVAC mode, HVAC action, fan preset) and builds the `Change`
//! commands that move the thermostat to a requested state.

use serde::Serialize;

use crate::protocol::command::{Changes, Command, DEFAULT_ZONE};
use crate::protocol::modes::{FanSpeed, OperatingMode};
use crate::protocol::status::StatusRecord;

/// Standard HVAC mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    Auto,
    FanOnly,
    Dry,
}

impl HvacMode {
    /// Modes offered to users.
    pub const ALL: [HvacMode; 6] = [
        HvacMode::Off,
        HvacMode::Heat,
        HvacMode::Cool,
        HvacMode::Auto,
        HvacMode::FanOnly,
        HvacMode::Dry,
    ];

    /// Device mode number written when selecting this mode.
    pub fn to_device_mode(self) -> i64 {
        match self {
            HvacMode::Off => 0,
            HvacMode::FanOnly => 1,
            HvacMode::Cool => 2,
            HvacMode::Heat => 4,
            HvacMode::Dry => 6,
            HvacMode::Auto => 11,
        }
    }

    /// Standard mode for a configured device mode number.
    ///
    /// The running variants (3 and 5) fold into their idle modes. Numbers
    /// outside the table read as off.
    pub fn from_device_mode(num: i64) -> Self {
        match num {
            1 => HvacMode::FanOnly,
            2 | 3 => HvacMode::Cool,
            4 | 5 => HvacMode::Heat,
            6 => HvacMode::Dry,
            11 => HvacMode::Auto,
            _ => HvacMode::Off,
        }
    }
}

/// What the equipment is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    Off,
    Idle,
    Fan,
    Cooling,
    Heating,
}

/// Standard fan preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanPreset {
    Off,
    Low,
    High,
    Auto,
}

impl FanPreset {
    /// Fold a device fan setting into a preset.
    pub fn from_fan_speed(speed: FanSpeed) -> Self {
        match speed {
            FanSpeed::Off => FanPreset::Off,
            FanSpeed::Low | FanSpeed::ManualLow | FanSpeed::CycledLow => FanPreset::Low,
            FanSpeed::High | FanSpeed::ManualHigh | FanSpeed::CycledHigh => FanPreset::High,
            FanSpeed::FullAuto => FanPreset::Auto,
        }
    }

    fn fan_only_num(self) -> i64 {
        match self {
            FanPreset::Low => 1,
            FanPreset::High => 2,
            FanPreset::Off | FanPreset::Auto => 0,
        }
    }

    fn full_num(self) -> i64 {
        match self {
            FanPreset::Off => 0,
            FanPreset::Low => 1,
            FanPreset::High => 2,
            FanPreset::Auto => 128,
        }
    }
}

/// Requested target temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureTarget {
    /// Single setpoint for the current mode.
    Single(i64),
    /// Auto-mode range.
    Range { low: i64, high: i64 },
}

/// Climate-entity state derived from a status record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateView {
    pub hvac_mode: HvacMode,
    pub hvac_action: HvacAction,
    pub fan_mode: FanPreset,
    pub current_temperature: i64,
    /// Setpoint of the active single-setpoint mode.
    pub target_temperature: Option<i64>,
    /// Auto-range lower bound, only in auto mode.
    pub target_temperature_low: Option<i64>,
    /// Auto-range upper bound, only in auto mode.
    pub target_temperature_high: Option<i64>,
}

impl ClimateView {
    /// Derive the view from a record.
    pub fn from_status(record: &StatusRecord) -> Self {
        let hvac_mode = hvac_mode(record);
        let (low, high) = if hvac_mode == HvacMode::Auto {
            (Some(record.auto_heat_sp), Some(record.auto_cool_sp))
        } else {
            (None, None)
        };

        Self {
            hvac_mode,
            hvac_action: hvac_action(record, hvac_mode),
            fan_mode: fan_preset(record, hvac_mode),
            current_temperature: record.face_plate_temperature,
            target_temperature: match hvac_mode {
                HvacMode::Cool => Some(record.cool_sp),
                HvacMode::Heat => Some(record.heat_sp),
                HvacMode::Dry => Some(record.dry_sp),
                _ => None,
            },
            target_temperature_low: low,
            target_temperature_high: high,
        }
    }

    /// Fan presets offered in the current mode.
    pub fn fan_modes(&self) -> &'static [FanPreset] {
        match self.hvac_mode {
            HvacMode::FanOnly => &[FanPreset::Off, FanPreset::Low, FanPreset::High],
            _ => &[FanPreset::Off, FanPreset::Low, FanPreset::High, FanPreset::Auto],
        }
    }
}

fn hvac_mode(record: &StatusRecord) -> HvacMode {
    if record.is_off() || record.off || record.current_mode == Some(OperatingMode::Off) {
        return HvacMode::Off;
    }
    HvacMode::from_device_mode(record.mode_num)
}

fn hvac_action(record: &StatusRecord, mode: HvacMode) -> HvacAction {
    if mode == HvacMode::Off {
        return HvacAction::Off;
    }

    match record.current_mode {
        Some(OperatingMode::Fan) => HvacAction::Fan,
        Some(OperatingMode::Cool | OperatingMode::CoolOn) => HvacAction::Cooling,
        Some(OperatingMode::Heat | OperatingMode::HeatOn) => HvacAction::Heating,
        Some(OperatingMode::Auto) => {
            let temp = record.face_plate_temperature;
            if temp < record.auto_heat_sp {
                HvacAction::Heating
            } else if temp > record.auto_cool_sp {
                HvacAction::Cooling
            } else {
                HvacAction::Idle
            }
        }
        Some(OperatingMode::Off) => HvacAction::Off,
        None => HvacAction::Idle,
    }
}

fn fan_preset(record: &StatusRecord, mode: HvacMode) -> FanPreset {
    let speed = match mode {
        HvacMode::FanOnly => FanSpeed::from_fan_only_num(record.fan_mode_num),
        HvacMode::Cool => FanSpeed::from_full_num(record.cool_fan_mode_num),
        HvacMode::Heat => FanSpeed::from_full_num(record.heat_fan_mode_num),
        HvacMode::Auto => FanSpeed::from_full_num(record.auto_fan_mode_num),
        HvacMode::Off | HvacMode::Dry => FanSpeed::FullAuto,
    };
    FanPreset::from_fan_speed(speed)
}

/// Command selecting an HVAC mode. Off powers the zone down.
pub fn hvac_mode_command(mode: HvacMode) -> Command {
    let changes = Changes::zone(DEFAULT_ZONE)
        .power(mode != HvacMode::Off)
        .mode(mode.to_device_mode());
    Command::change(changes)
}

/// Command applying a temperature target in the given mode.
///
/// Returns `None` when a single setpoint is requested in a mode without one.
pub fn temperature_command(mode: HvacMode, target: TemperatureTarget) -> Option<Command> {
    let changes = Changes::zone(DEFAULT_ZONE).power(true);
    let changes = match target {
        TemperatureTarget::Range { low, high } => changes.auto_range(low, high),
        TemperatureTarget::Single(value) => match mode {
            HvacMode::Cool => changes.cool_setpoint(value),
            HvacMode::Heat => changes.heat_setpoint(value),
            HvacMode::Dry => changes.dry_setpoint(value),
            _ => return None,
        },
    };
    Some(Command::change(changes))
}

/// Command applying a fan preset in the given mode.
///
/// Returns `None` in modes without a fan setting.
pub fn fan_mode_command(mode: HvacMode, preset: FanPreset) -> Option<Command> {
    let changes = Changes::zone(DEFAULT_ZONE);
    let changes = match mode {
        HvacMode::FanOnly => changes.fan_only(preset.fan_only_num()),
        HvacMode::Cool => changes.cool_fan(preset.full_num()),
        HvacMode::Heat => changes.heat_fan(preset.full_num()),
        HvacMode::Auto => changes.auto_fan(preset.full_num()),
        HvacMode::Off | HvacMode::Dry => return None,
    };
    Some(Command::change(changes))
}
