//! Configuration for LetPot device sessions
//!
//! Configuration is read from a TOML file. Only `[account]` and `[device]` are
//! required; broker, reconnect and status sections fall back to the values the
//! LetPot cloud uses.

use crate::models::AccountIdentity;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LetPotConfig {
    pub account: AccountSection,
    pub device: DeviceSection,
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub status: StatusSection,
}

/// Account section - identity used to derive broker credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountSection {
    /// Account email address
    pub email: String,
    /// Account user identifier; takes precedence over `user_id_env`
    pub user_id: Option<String>,
    /// Environment variable containing the user identifier
    #[serde(default = "default_user_id_env")]
    pub user_id_env: String,
}

/// Device section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device serial number, e.g. `LPH21ABCD1234`
    pub serial: String,
}

/// Broker section - connection parameters for the LetPot broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    #[serde(default = "default_broker_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Web-socket path on the broker
    #[serde(default = "default_broker_path")]
    pub path: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum transport unit for command frames
    #[serde(default = "default_mtu")]
    pub mtu: usize,
}

/// Reconnect section - linear backoff between failed connections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    /// Delay added per consecutive failure
    #[serde(default = "default_reconnect_step")]
    pub step_secs: u64,
    /// Upper bound for the delay
    #[serde(default = "default_reconnect_max")]
    pub max_delay_secs: u64,
}

/// Status section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSection {
    /// How long a locally published status is used as baseline without confirmation
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: u64,
}

fn default_user_id_env() -> String {
    "LETPOT_USER_ID".to_string()
}

fn default_broker_host() -> String {
    "broker.letpot.net".to_string()
}

fn default_broker_port() -> u16 {
    443
}

fn default_broker_path() -> String {
    "/mqttwss".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_mtu() -> usize {
    128
}

fn default_reconnect_step() -> u64 {
    15
}

fn default_reconnect_max() -> u64 {
    600
}

fn default_pending_ttl() -> u64 {
    5
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            path: default_broker_path(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            mtu: default_mtu(),
        }
    }
}

impl BrokerSection {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            step_secs: default_reconnect_step(),
            max_delay_secs: default_reconnect_max(),
        }
    }
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            pending_ttl_secs: default_pending_ttl(),
        }
    }
}

impl StatusSection {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LetPotConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LetPotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration with default broker settings
    pub fn new(email: &str, user_id: &str, serial: &str) -> Self {
        Self {
            account: AccountSection {
                email: email.to_string(),
                user_id: Some(user_id.to_string()),
                user_id_env: default_user_id_env(),
            },
            device: DeviceSection {
                serial: serial.to_string(),
            },
            broker: BrokerSection::default(),
            reconnect: ReconnectSection::default(),
            status: StatusSection::default(),
        }
    }

    /// Check field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.email.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "account.email must not be empty".to_string(),
            ));
        }

        if self.device.serial.chars().count() < 5 {
            return Err(ConfigError::InvalidConfig(format!(
                "device.serial '{}' must be at least 5 characters",
                self.device.serial
            )));
        }

        // The frame length byte carries the chunk plus two total-length bytes
        if !(7..=257).contains(&self.broker.mtu) {
            return Err(ConfigError::InvalidConfig(format!(
                "broker.mtu must be between 7 and 257, got {}",
                self.broker.mtu
            )));
        }

        if !self.broker.path.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "broker.path '{}' must start with '/'",
                self.broker.path
            )));
        }

        if self.reconnect.step_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect.step_secs must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_delay_secs < self.reconnect.step_secs {
            return Err(ConfigError::InvalidConfig(
                "reconnect.max_delay_secs must not be smaller than reconnect.step_secs"
                    .to_string(),
            ));
        }

        if self.status.pending_ttl_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "status.pending_ttl_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the account identity, reading the user id from the environment if needed
    pub fn account_identity(&self) -> Result<AccountIdentity, ConfigError> {
        let user_id = match &self.account.user_id {
            Some(user_id) => user_id.clone(),
            None => std::env::var(&self.account.user_id_env)
                .map_err(|_| ConfigError::EnvVarNotFound(self.account.user_id_env.clone()))?,
        };

        Ok(AccountIdentity::new(user_id, self.account.email.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[account]
email = "email@example.com"
user_id = "a1b2c3d4e5f6a1b2c3d4e5f6"

[device]
serial = "LPH21ABCD1234"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = LetPotConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.device.serial, "LPH21ABCD1234");
        assert_eq!(config.broker.host, "broker.letpot.net");
        assert_eq!(config.broker.port, 443);
        assert_eq!(config.broker.path, "/mqttwss");
        assert_eq!(config.broker.mtu, 128);
        assert_eq!(config.reconnect.step_secs, 15);
        assert_eq!(config.reconnect.max_delay_secs, 600);
        assert_eq!(config.status.pending_ttl(), Duration::from_secs(5));
        assert_eq!(config.account.user_id_env, "LETPOT_USER_ID");
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[account]
email = "email@example.com"
user_id_env = "MY_LETPOT_UID"

[device]
serial = "LPH63XYZ"

[broker]
host = "localhost"
port = 8443
path = "/ws"
keep_alive_secs = 30
connect_timeout_secs = 5
mtu = 64

[reconnect]
step_secs = 1
max_delay_secs = 10

[status]
pending_ttl_secs = 2
"#;

        let config = LetPotConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 8443);
        assert_eq!(config.broker.keep_alive(), Duration::from_secs(30));
        assert_eq!(config.broker.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.broker.mtu, 64);
        assert_eq!(config.reconnect.max_delay_secs, 10);
        assert_eq!(config.account.user_id, None);
        assert_eq!(config.account.user_id_env, "MY_LETPOT_UID");
    }

    #[test]
    fn test_short_serial_rejected() {
        let mut config = LetPotConfig::new("email@example.com", "uid", "LPH2");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));

        config.device.serial = "LPH21".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mtu_bounds() {
        let mut config = LetPotConfig::new("email@example.com", "uid", "LPH21ABC");

        config.broker.mtu = 6;
        assert!(config.validate().is_err());

        config.broker.mtu = 258;
        assert!(config.validate().is_err());

        config.broker.mtu = 7;
        assert!(config.validate().is_ok());

        config.broker.mtu = 257;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reconnect_validation() {
        let mut config = LetPotConfig::new("email@example.com", "uid", "LPH21ABC");

        config.reconnect.step_secs = 0;
        assert!(config.validate().is_err());

        config.reconnect.step_secs = 30;
        config.reconnect.max_delay_secs = 15;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_email_rejected() {
        let config = LetPotConfig::new("  ", "uid", "LPH21ABC");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_broker_path_must_be_absolute() {
        let mut config = LetPotConfig::new("email@example.com", "uid", "LPH21ABC");
        config.broker.path = "mqttwss".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_literal_user_id_wins() {
        let config = LetPotConfig::from_toml_str(MINIMAL).unwrap();
        let identity = config.account_identity().unwrap();

        assert_eq!(identity.user_id, "a1b2c3d4e5f6a1b2c3d4e5f6");
        assert_eq!(identity.email, "email@example.com");
    }

    #[test]
    fn test_missing_user_id_env() {
        let mut config = LetPotConfig::new("email@example.com", "uid", "LPH21ABC");
        config.account.user_id = None;
        config.account.user_id_env = "LETPOT_TEST_UNSET_USER_ID_VARIABLE".to_string();

        let result = config.account_identity();
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound(_))));
    }
}
