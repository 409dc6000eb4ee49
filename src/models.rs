//! Domain types shared by the session layer and the device converters

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Number of serial characters that identify the device type
pub const DEVICE_TYPE_PREFIX_LEN: usize = 5;

/// Account identity used to derive broker credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub user_id: String,
    pub email: String,
}

impl AccountIdentity {
    pub fn new<U: Into<String>, E: Into<String>>(user_id: U, email: E) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// Human readable model information for a device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceModel {
    pub name: &'static str,
    pub code: &'static str,
}

/// Identity of a single garden, fixed at client construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    serial: String,
    device_type: String,
    model: Option<DeviceModel>,
}

impl DeviceIdentity {
    pub fn new(serial: &str, model: Option<DeviceModel>) -> Self {
        Self {
            serial: serial.to_string(),
            device_type: device_type_of(serial),
            model,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Device type prefix, e.g. `LPH21`
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn model(&self) -> Option<DeviceModel> {
        self.model
    }
}

/// Extract the device type prefix from a serial number
pub fn device_type_of(serial: &str) -> String {
    serial.chars().take(DEVICE_TYPE_PREFIX_LEN).collect()
}

/// Status reported by a garden
///
/// Values are never edited in place by the session layer: commands build a copy
/// of the baseline status with a single field replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    /// Raw frame bytes the status was decoded from
    pub raw: Vec<u8>,
    pub light_brightness: Option<u16>,
    pub light_mode: u8,
    pub light_schedule_end: NaiveTime,
    pub light_schedule_start: NaiveTime,
    pub online: bool,
    pub plant_days: u16,
    pub pump_mode: u8,
    pub pump_nutrient: Option<bool>,
    pub pump_status: Option<u8>,
    pub system_on: bool,
    pub system_sound: Option<bool>,
    pub system_state: u8,
    pub temperature_unit: Option<u8>,
    pub temperature_value: Option<u16>,
    pub water_level: Option<u16>,
    pub water_mode: Option<u8>,
}
