//! LPH60, LPH61 and LPH62 (Max)

use super::{
    base_status, decode_status_bytes, eighth_steps, update_prefix, word_at, DeviceConverter,
};
use crate::models::{DeviceModel, DeviceStatus};

const REQUEST_CODE: u8 = 13;
const STATUS_MARKER: u8 = 14;
const STATUS_LEN: usize = 27;

#[derive(Debug, Clone, Copy, Default)]
pub struct Lph6xConverter;

impl DeviceConverter for Lph6xConverter {
    fn name(&self) -> &'static str {
        "LPH6x"
    }

    fn supports_type(&self, device_type: &str) -> bool {
        matches!(device_type, "LPH60" | "LPH61" | "LPH62")
    }

    fn device_model(&self, device_type: &str) -> Option<DeviceModel> {
        let code = match device_type {
            "LPH60" => "LPH60",
            "LPH61" => "LPH61",
            "LPH62" => "LPH62",
            _ => return None,
        };
        Some(DeviceModel {
            name: "LetPot Max",
            code,
        })
    }

    fn light_brightness_levels(&self, _device_type: &str) -> Vec<u16> {
        eighth_steps()
    }

    fn current_status_message(&self) -> Vec<u8> {
        vec![REQUEST_CODE, 1]
    }

    fn update_status_message(&self, status: &DeviceStatus) -> Vec<u8> {
        let mut message = update_prefix(REQUEST_CODE, status);
        message.push(status.water_mode.unwrap_or_default());
        message.extend_from_slice(&status.light_brightness.unwrap_or_default().to_be_bytes());
        message.push(status.temperature_unit.unwrap_or_default());
        message.push(u8::from(status.system_sound == Some(true)));
        message.push(u8::from(status.pump_nutrient == Some(true)));
        message
    }

    fn convert_hex_to_status(&self, hex_message: &[u8]) -> Option<DeviceStatus> {
        let data = decode_status_bytes(hex_message, STATUS_MARKER, STATUS_LEN)?;
        let base = base_status(&data)?;

        Some(DeviceStatus {
            water_mode: Some(data[17]),
            light_brightness: Some(word_at(&data, 18)),
            water_level: Some(word_at(&data, 20)),
            temperature_value: Some(word_at(&data, 22)),
            temperature_unit: Some(data[24]),
            system_sound: Some(data[25] == 1),
            pump_nutrient: Some(data[26] == 1),
            ..base
        })
    }
}
