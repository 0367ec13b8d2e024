//! Operating-mode and fan-speed tables.

use serde::Serialize;

/// Thermostat operating mode as reported in the status array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperatingMode {
    /// Off (0).
    #[serde(rename = "off")]
    Off,
    /// Fan only (1).
    #[serde(rename = "fan")]
    Fan,
    /// Cool, idle (2).
    #[serde(rename = "cool")]
    Cool,
    /// Cool, compressor running (3).
    #[serde(rename = "cool_on")]
    CoolOn,
    /// Heat, idle (4).
    #[serde(rename = "heat")]
    Heat,
    /// Heat, running (5).
    #[serde(rename = "heat_on")]
    HeatOn,
    /// Auto (11).
    #[serde(rename = "auto")]
    Auto,
}

impl OperatingMode {
    /// Look up a mode number; `None` for numbers outside the table.
    pub fn from_num(num: i64) -> Option<Self> {
        match num {
            0 => Some(Self::Off),
            1 => Some(Self::Fan),
            2 => Some(Self::Cool),
            3 => Some(Self::CoolOn),
            4 => Some(Self::Heat),
            5 => Some(Self::HeatOn),
            11 => Some(Self::Auto),
            _ => None,
        }
    }

    /// Wire number of this mode.
    pub fn to_num(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Fan => 1,
            Self::Cool => 2,
            Self::CoolOn => 3,
            Self::Heat => 4,
            Self::HeatOn => 5,
            Self::Auto => 11,
        }
    }

    /// Device name of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Fan => "fan",
            Self::Cool => "cool",
            Self::CoolOn => "cool_on",
            Self::Heat => "heat",
            Self::HeatOn => "heat_on",
            Self::Auto => "auto",
        }
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan setting as named by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FanSpeed {
    /// Fan off.
    #[serde(rename = "off")]
    Off,
    /// Low (fan-only mode).
    #[serde(rename = "low")]
    Low,
    /// High (fan-only mode).
    #[serde(rename = "high")]
    High,
    /// Manual low.
    #[serde(rename = "manualL")]
    ManualLow,
    /// Manual high.
    #[serde(rename = "manualH")]
    ManualHigh,
    /// Cycled low.
    #[serde(rename = "cycledL")]
    CycledLow,
    /// Cycled high.
    #[serde(rename = "cycledH")]
    CycledHigh,
    /// Fully automatic.
    #[serde(rename = "full auto")]
    FullAuto,
}

impl FanSpeed {
    /// Decode a fan number in fan-only mode. Unknown numbers read as off.
    pub fn from_fan_only_num(num: i64) -> Self {
        match num {
            1 => Self::Low,
            2 => Self::High,
            _ => Self::Off,
        }
    }

    /// Decode a fan number in cool, heat or auto mode. Unknown numbers read as full auto.
    pub fn from_full_num(num: i64) -> Self {
        match num {
            0 => Self::Off,
            1 => Self::ManualLow,
            2 => Self::ManualHigh,
            65 => Self::CycledLow,
            66 => Self::CycledHigh,
            _ => Self::FullAuto,
        }
    }

    /// Wire number of this setting.
    pub fn to_num(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Low | Self::ManualLow => 1,
            Self::High | Self::ManualHigh => 2,
            Self::CycledLow => 65,
            Self::CycledHigh => 66,
            Self::FullAuto => 128,
        }
    }

    /// Device name of this setting.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::High => "high",
            Self::ManualLow => "manualL",
            Self::ManualHigh => "manualH",
            Self::CycledLow => "cycledL",
            Self::CycledHigh => "cycledH",
            Self::FullAuto => "full auto",
        }
    }
}

impl std::fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_table() {
        for num in [0, 1, 2, 3, 4, 5, 11] {
            let mode = OperatingMode::from_num(num).unwrap();
            assert_eq!(mode.to_num(), num);
        }
        assert_eq!(OperatingMode::from_num(6), None);
        assert_eq!(OperatingMode::from_num(11).unwrap().as_str(), "auto");
        assert_eq!(OperatingMode::CoolOn.to_string(), "cool_on");
    }

    #[test]
    fn test_fan_only_defaults_to_off() {
        assert_eq!(FanSpeed::from_fan_only_num(2), FanSpeed::High);
        assert_eq!(FanSpeed::from_fan_only_num(128), FanSpeed::Off);
    }

    #[test]
    fn test_full_table_defaults_to_full_auto() {
        assert_eq!(FanSpeed::from_full_num(65), FanSpeed::CycledLow);
        assert_eq!(FanSpeed::from_full_num(128), FanSpeed::FullAuto);
        assert_eq!(FanSpeed::from_full_num(7), FanSpeed::FullAuto);
        assert_eq!(FanSpeed::FullAuto.as_str(), "full auto");
    }

    #[test]
    fn test_serialized_name_matches_display() {
        for num in [0, 1, 2, 3, 4, 5, 11] {
            let mode = OperatingMode::from_num(num).unwrap();
            assert_eq!(serde_json::to_value(mode).unwrap(), mode.as_str());
        }
        for num in [0, 1, 2, 65, 66, 128] {
            let speed = FanSpeed::from_full_num(num);
            assert_eq!(serde_json::to_value(speed).unwrap(), speed.as_str());
        }
        for num in [1, 2] {
            let speed = FanSpeed::from_fan_only_num(num);
            assert_eq!(serde_json::to_value(speed).unwrap(), speed.as_str());
        }
    }

    #[test]
    fn test_serializes_as_device_name() {
        assert_eq!(
            serde_json::to_string(&FanSpeed::ManualHigh).unwrap(),
            "\"manualH\""
        );
        assert_eq!(
            serde_json::to_string(&OperatingMode::HeatOn).unwrap(),
            "\"heat_on\""
        );
    }
}
