//! Testing utilities
//!
//! An in-memory broker ([`mocks`]) and status fixtures for exercising device
//! sessions without network access.

pub mod mocks;

pub use mocks::{ConnectAttempt, MockBroker, MockConnector, MockTransport};

use crate::models::DeviceStatus;
use chrono::NaiveTime;

/// A plausible LPHx1 status: on, vegetable mode, lights 07:30 to 22:15 at 1000
pub fn sample_status() -> DeviceStatus {
    let mut status = DeviceStatus {
        raw: Vec::new(),
        light_brightness: Some(1000),
        light_mode: 1,
        light_schedule_end: NaiveTime::from_hms_opt(22, 15, 0).expect("valid time"),
        light_schedule_start: NaiveTime::from_hms_opt(7, 30, 0).expect("valid time"),
        online: true,
        plant_days: 12,
        pump_mode: 1,
        pump_nutrient: None,
        pump_status: Some(0),
        system_on: true,
        system_sound: Some(false),
        system_state: 1,
        temperature_unit: None,
        temperature_value: None,
        water_level: None,
        water_mode: None,
    };
    status.raw = lphx1_report_bytes(&status);
    status
}

/// Raw bytes of an LPHx1 status report carrying `status`
pub fn lphx1_report_bytes(status: &DeviceStatus) -> Vec<u8> {
    use chrono::Timelike;

    let [days_high, days_low] = status.plant_days.to_be_bytes();
    let [brightness_high, brightness_low] = status.light_brightness.unwrap_or(0).to_be_bytes();
    let body = [
        98,
        1,
        u8::from(!status.online),
        status.system_state,
        u8::from(status.system_on),
        status.pump_mode,
        status.light_mode,
        days_high,
        days_low,
        status.light_schedule_start.hour() as u8,
        status.light_schedule_start.minute() as u8,
        status.light_schedule_end.hour() as u8,
        status.light_schedule_end.minute() as u8,
        brightness_high,
        brightness_low,
        status.pump_status.unwrap_or(0),
        u8::from(status.system_sound == Some(true)),
    ];

    let mut bytes = vec![77, 0, 0, body.len() as u8];
    bytes.extend_from_slice(&body);
    bytes
}

/// Hex payload of an LPHx1 status report, as the device publishes it
pub fn lphx1_report_hex(status: &DeviceStatus) -> String {
    hex::encode(lphx1_report_bytes(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::{DeviceConverter, LphX1Converter};

    #[test]
    fn test_fixture_decodes_to_itself() {
        let status = sample_status();
        let decoded = LphX1Converter
            .convert_hex_to_status(lphx1_report_hex(&status).as_bytes())
            .unwrap();
        assert_eq!(decoded, status);
    }
}
