//! Topic construction for device data and command channels

/// Topic the device publishes status reports on: `{serial}/data`
pub fn data_topic(serial: &str) -> String {
    format!("{serial}/data")
}

/// Topic the device receives commands on: `{serial}/cmd`
pub fn command_topic(serial: &str) -> String {
    format!("{serial}/cmd")
}

/// Pair of topics used by one device session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    pub data: String,
    pub command: String,
}

impl DeviceTopics {
    pub fn for_serial(serial: &str) -> Self {
        Self {
            data: data_topic(serial),
            command: command_topic(serial),
        }
    }
}
