//! IGS01 (Pro), LPH27, LPH37 (SE) and LPH39 (Mini)

use super::{base_status, decode_status_bytes, update_prefix, DeviceConverter};
use crate::models::{DeviceModel, DeviceStatus};

const REQUEST_CODE: u8 = 11;
const STATUS_MARKER: u8 = 12;
const STATUS_LEN: usize = 18;

#[derive(Debug, Clone, Copy, Default)]
pub struct IgsOrAltConverter;

impl DeviceConverter for IgsOrAltConverter {
    fn name(&self) -> &'static str {
        "IGSorAlt"
    }

    fn supports_type(&self, device_type: &str) -> bool {
        matches!(device_type, "IGS01" | "LPH27" | "LPH37" | "LPH39")
    }

    fn device_model(&self, device_type: &str) -> Option<DeviceModel> {
        let (name, code) = match device_type {
            "IGS01" => ("LetPot Pro", "IGS01"),
            "LPH37" => ("LetPot SE", "LPH37"),
            "LPH39" => ("LetPot Mini", "LPH39"),
            _ => return None,
        };
        Some(DeviceModel { name, code })
    }

    fn light_brightness_levels(&self, _device_type: &str) -> Vec<u16> {
        Vec::new()
    }

    fn current_status_message(&self) -> Vec<u8> {
        vec![REQUEST_CODE, 1]
    }

    fn update_status_message(&self, status: &DeviceStatus) -> Vec<u8> {
        let mut message = update_prefix(REQUEST_CODE, status);
        message.push(u8::from(status.system_sound == Some(true)));
        message
    }

    fn convert_hex_to_status(&self, hex_message: &[u8]) -> Option<DeviceStatus> {
        let data = decode_status_bytes(hex_message, STATUS_MARKER, STATUS_LEN)?;
        let base = base_status(&data)?;

        Some(DeviceStatus {
            system_sound: Some(data[17] == 1),
            ..base
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_support::status_hex;

    const BODY: [u8; 12] = [0, 1, 0, 0, 1, 1, 44, 6, 0, 20, 0, 0];

    #[test]
    fn test_decode_status() {
        let status = IgsOrAltConverter
            .convert_hex_to_status(&status_hex(STATUS_MARKER, &BODY))
            .unwrap();

        assert!(status.online);
        assert!(!status.system_on);
        assert_eq!(status.light_mode, 1);
        assert_eq!(status.plant_days, 300);
        assert_eq!(status.light_brightness, None);
        assert_eq!(status.pump_status, None);
        assert_eq!(status.system_sound, Some(false));
    }

    #[test]
    fn test_update_message_layout() {
        let status = IgsOrAltConverter
            .convert_hex_to_status(&status_hex(STATUS_MARKER, &BODY))
            .unwrap();
        let status = DeviceStatus {
            system_on: true,
            system_sound: Some(true),
            ..status
        };

        assert_eq!(
            IgsOrAltConverter.update_status_message(&status),
            vec![11, 2, 1, 0, 1, 1, 44, 6, 0, 20, 0, 1]
        );
    }

    #[test]
    fn test_no_brightness_control() {
        for device_type in ["IGS01", "LPH27", "LPH37", "LPH39"] {
            assert!(IgsOrAltConverter
                .light_brightness_levels(device_type)
                .is_empty());
        }
    }

    #[test]
    fn test_lph27_has_no_known_model() {
        assert_eq!(IgsOrAltConverter.device_model("LPH27"), None);
        assert_eq!(
            IgsOrAltConverter.device_model("IGS01").map(|m| m.name),
            Some("LetPot Pro")
        );
    }
}
