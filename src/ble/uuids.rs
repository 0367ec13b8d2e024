//! BLE Service and Characteristic UUIDs.
//!
//! Contains all UUID constants used for EasyTouch thermostat communication.

use uuid::Uuid;

/// EasyTouch primary service UUID.
pub const EASYTOUCH_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_00ff_0000_1000_8000_00805f9b34fb);

/// Password characteristic (write with response) used to authenticate.
pub const PASSWORD_CMD_UUID: Uuid = Uuid::from_u128(0x0000_dd01_0000_1000_8000_00805f9b34fb);

/// JSON command characteristic (write with response).
pub const JSON_CMD_UUID: Uuid = Uuid::from_u128(0x0000_ee01_0000_1000_8000_00805f9b34fb);

/// JSON status characteristic (read).
pub const JSON_RETURN_UUID: Uuid = Uuid::from_u128(0x0000_ff01_0000_1000_8000_00805f9b34fb);

/// Check if a characteristic UUID belongs to the EasyTouch protocol.
pub fn is_easytouch_characteristic(uuid: &Uuid) -> bool {
    *uuid == PASSWORD_CMD_UUID || *uuid == JSON_CMD_UUID || *uuid == JSON_RETURN_UUID
}
