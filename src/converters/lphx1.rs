//! LPH11 (Mini), LPH21 (Air) and LPH31 (SE)

use super::{base_status, decode_status_bytes, update_prefix, word_at, DeviceConverter};
use crate::models::{DeviceModel, DeviceStatus};

const REQUEST_CODE: u8 = 97;
const STATUS_MARKER: u8 = 98;
const STATUS_LEN: usize = 21;

#[derive(Debug, Clone, Copy, Default)]
pub struct LphX1Converter;

impl DeviceConverter for LphX1Converter {
    fn name(&self) -> &'static str {
        "LPHx1"
    }

    fn supports_type(&self, device_type: &str) -> bool {
        matches!(device_type, "LPH11" | "LPH21" | "LPH31")
    }

    fn device_model(&self, device_type: &str) -> Option<DeviceModel> {
        let (name, code) = match device_type {
            "LPH11" => ("LetPot Mini", "LPH11"),
            "LPH21" => ("LetPot Air", "LPH21"),
            "LPH31" => ("LetPot SE", "LPH31"),
            _ => return None,
        };
        Some(DeviceModel { name, code })
    }

    fn light_brightness_levels(&self, device_type: &str) -> Vec<u16> {
        match device_type {
            "LPH21" | "LPH31" => vec![500, 1000],
            _ => Vec::new(),
        }
    }

    fn current_status_message(&self) -> Vec<u8> {
        vec![REQUEST_CODE, 1]
    }

    fn update_status_message(&self, status: &DeviceStatus) -> Vec<u8> {
        let mut message = update_prefix(REQUEST_CODE, status);
        message.extend_from_slice(&status.light_brightness.unwrap_or_default().to_be_bytes());
        message.push(u8::from(status.system_sound == Some(true)));
        message
    }

    fn convert_hex_to_status(&self, hex_message: &[u8]) -> Option<DeviceStatus> {
        let data = decode_status_bytes(hex_message, STATUS_MARKER, STATUS_LEN)?;
        let base = base_status(&data)?;

        Some(DeviceStatus {
            light_brightness: Some(word_at(&data, 17)),
            pump_status: Some(data[19]),
            system_sound: Some(data[20] == 1),
            ..base
        })
    }
}
