//! LPH63 (Max)

use super::{
    base_status, decode_status_bytes, eighth_steps, update_prefix, word_at, DeviceConverter,
};
use crate::models::{DeviceModel, DeviceStatus};

const REQUEST_CODE: u8 = 101;
const STATUS_MARKER: u8 = 102;
const STATUS_LEN: usize = 27;

#[derive(Debug, Clone, Copy, Default)]
pub struct Lph63Converter;

impl DeviceConverter for Lph63Converter {
    fn name(&self) -> &'static str {
        "LPH63"
    }

    fn supports_type(&self, device_type: &str) -> bool {
        device_type == "LPH63"
    }

    fn device_model(&self, device_type: &str) -> Option<DeviceModel> {
        self.supports_type(device_type).then_some(DeviceModel {
            name: "LetPot Max",
            code: "LPH63",
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
            pump_status: Some(data[26]),
            ..base
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_support::status_hex;

    const BODY: [u8; 21] = [
        1, 0, 1, 1, 0, 0, 45, 5, 45, 21, 15, 0, 2, 238, 0, 40, 0, 22, 0, 0, 1,
    ];

    #[test]
    fn test_decode_status() {
        let status = Lph63Converter
            .convert_hex_to_status(&status_hex(STATUS_MARKER, &BODY))
            .unwrap();

        assert!(!status.online);
        assert_eq!(status.plant_days, 45);
        assert_eq!(status.water_mode, Some(0));
        assert_eq!(status.light_brightness, Some(750));
        assert_eq!(status.water_level, Some(40));
        assert_eq!(status.temperature_value, Some(22));
        assert_eq!(status.temperature_unit, Some(0));
        assert_eq!(status.pump_status, Some(1));
        assert_eq!(status.system_sound, None);
        assert_eq!(status.pump_nutrient, None);
    }

    #[test]
    fn test_update_message_layout() {
        let status = Lph63Converter
            .convert_hex_to_status(&status_hex(STATUS_MARKER, &BODY))
            .unwrap();

        assert_eq!(
            Lph63Converter.update_status_message(&status),
            vec![101, 2, 1, 1, 0, 0, 45, 5, 45, 21, 15, 0, 2, 238]
        );
    }

    #[test]
    fn test_ignores_lph6x_reports() {
        assert!(Lph63Converter
            .convert_hex_to_status(&status_hex(14, &BODY))
            .is_none());
    }
}
