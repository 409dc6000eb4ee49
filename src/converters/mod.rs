//! Device family converters
//!
//! Every LetPot device family speaks its own byte layout inside the framed
//! command payload. A [`DeviceConverter`] translates between that layout and
//! [`DeviceStatus`]; the registry in [`CONVERTERS`] is consulted once, when a
//! client is built for a serial number.

use crate::models::DeviceStatus;
use chrono::{NaiveTime, Timelike};

pub mod igs_alt;
pub mod lph63;
pub mod lph6x;
pub mod lphx1;

pub use igs_alt::IgsOrAltConverter;
pub use lph63::Lph63Converter;
pub use lph6x::Lph6xConverter;
pub use lphx1::LphX1Converter;

use crate::models::DeviceModel;

/// Translation between device bytes and [`DeviceStatus`] for one device family
pub trait DeviceConverter: Send + Sync {
    /// Family name used in logs
    fn name(&self) -> &'static str;

    /// Whether this converter handles the device type prefix (e.g. `LPH21`)
    fn supports_type(&self, device_type: &str) -> bool;

    /// Marketing name and code for a device type, when known
    fn device_model(&self, device_type: &str) -> Option<DeviceModel>;

    /// Brightness levels the device type accepts, in ascending order
    fn light_brightness_levels(&self, device_type: &str) -> Vec<u16>;

    /// Payload requesting the current status
    fn current_status_message(&self) -> Vec<u8>;

    /// Payload replacing the device status with `status`
    fn update_status_message(&self, status: &DeviceStatus) -> Vec<u8>;

    /// Decode a hex encoded status report, `None` if the payload is not one
    fn convert_hex_to_status(&self, hex_message: &[u8]) -> Option<DeviceStatus>;
}

/// All known device families
pub static CONVERTERS: &[&dyn DeviceConverter] = &[
    &LphX1Converter,
    &IgsOrAltConverter,
    &Lph6xConverter,
    &Lph63Converter,
];

/// Find the converter for a device type prefix
pub fn converter_for(device_type: &str) -> Option<&'static dyn DeviceConverter> {
    CONVERTERS
        .iter()
        .copied()
        .find(|converter| converter.supports_type(device_type))
}

/// Decode a hex status report and check its message marker
///
/// Returns the raw frame bytes when the payload is valid hex, at least
/// `min_len` bytes long and carries `marker, 1` at offsets 4 and 5.
fn decode_status_bytes(hex_message: &[u8], marker: u8, min_len: usize) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(hex_message).ok()?;
    let data = hex::decode(text.trim()).ok()?;
    if data.len() < min_len || data[4] != marker || data[5] != 1 {
        return None;
    }
    Some(data)
}

/// Decode the fields shared by all device families
///
/// `data` must hold at least 17 bytes; family specific fields are left empty.
fn base_status(data: &[u8]) -> Option<DeviceStatus> {
    Some(DeviceStatus {
        raw: data.to_vec(),
        light_brightness: None,
        light_mode: data[10],
        light_schedule_end: time_at(data, 15)?,
        light_schedule_start: time_at(data, 13)?,
        online: data[6] == 0,
        plant_days: word_at(data, 11),
        pump_mode: data[9],
        pump_nutrient: None,
        pump_status: None,
        system_on: data[8] == 1,
        system_sound: None,
        system_state: data[7],
        temperature_unit: None,
        temperature_value: None,
        water_level: None,
        water_mode: None,
    })
}

/// Encode the update prefix shared by all device families
fn update_prefix(message_code: u8, status: &DeviceStatus) -> Vec<u8> {
    let [days_high, days_low] = status.plant_days.to_be_bytes();
    vec![
        message_code,
        2,
        u8::from(status.system_on),
        status.pump_mode,
        status.light_mode,
        days_high,
        days_low,
        status.light_schedule_start.hour() as u8,
        status.light_schedule_start.minute() as u8,
        status.light_schedule_end.hour() as u8,
        status.light_schedule_end.minute() as u8,
    ]
}

fn word_at(data: &[u8], index: usize) -> u16 {
    u16::from_be_bytes([data[index], data[index + 1]])
}

fn time_at(data: &[u8], index: usize) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(u32::from(data[index]), u32::from(data[index + 1]), 0)
}

/// Brightness levels 0..=1000 in steps of 125
fn eighth_steps() -> Vec<u16> {
    (0..=8).map(|step| step * 125).collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_selection() {
        assert_eq!(converter_for("LPH11").map(|c| c.name()), Some("LPHx1"));
        assert_eq!(converter_for("LPH21").map(|c| c.name()), Some("LPHx1"));
        assert_eq!(converter_for("IGS01").map(|c| c.name()), Some("IGSorAlt"));
        assert_eq!(converter_for("LPH39").map(|c| c.name()), Some("IGSorAlt"));
        assert_eq!(converter_for("LPH61").map(|c| c.name()), Some("LPH6x"));
        assert_eq!(converter_for("LPH63").map(|c| c.name()), Some("LPH63"));
        assert!(converter_for("XYZ00").is_none());
    }

    #[test]
    fn test_families_do_not_overlap() {
        for device_type in [
            "LPH11", "LPH21", "LPH31", "IGS01", "LPH27", "LPH37", "LPH39", "LPH60", "LPH61",
            "LPH62", "LPH63",
        ] {
            let matching = CONVERTERS
                .iter()
                .filter(|converter| converter.supports_type(device_type))
                .count();
            assert_eq!(matching, 1, "{device_type} should match exactly one family");
        }
    }

    #[test]
    fn test_decode_rejects_invalid_hex_and_short_payloads() {
        assert!(decode_status_bytes(b"not hex", 98, 6).is_none());
        assert!(decode_status_bytes(b"4d00", 98, 6).is_none());
        assert!(decode_status_bytes(b"4d0000026101", 98, 6).is_none());
        assert!(decode_status_bytes(b"4d0000026201", 98, 6).is_some());
    }

    #[test]
    fn test_eighth_steps() {
        assert_eq!(
            eighth_steps(),
            vec![0, 125, 250, 375, 500, 625, 750, 875, 1000]
        );
    }
}
