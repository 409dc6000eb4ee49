//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use letpot::config::{ConfigError, LetPotConfig};
use letpot::DeviceClient;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[account]
email = "email@example.com"
user_id = "a1b2c3d4e5f6a1b2c3d4e5f6"

[device]
serial = "LPH62ABCD1234"

[broker]
host = "broker.example.com"
port = 8443
path = "/ws"
keep_alive_secs = 30
mtu = 64

[reconnect]
step_secs = 5
max_delay_secs = 60

[status]
pending_ttl_secs = 3
"#,
    );

    let config = LetPotConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.account.email, "email@example.com");
    assert_eq!(config.device.serial, "LPH62ABCD1234");
    assert_eq!(config.broker.host, "broker.example.com");
    assert_eq!(config.broker.port, 8443);
    assert_eq!(config.broker.path, "/ws");
    assert_eq!(config.broker.keep_alive(), Duration::from_secs(30));
    assert_eq!(config.broker.connect_timeout(), Duration::from_secs(30));
    assert_eq!(config.broker.mtu, 64);
    assert_eq!(config.reconnect.step_secs, 5);
    assert_eq!(config.reconnect.max_delay_secs, 60);
    assert_eq!(config.status.pending_ttl(), Duration::from_secs(3));
}

#[test]
fn test_loaded_config_builds_a_client() {
    let temp_file = write_config(
        r#"
[account]
email = "email@example.com"
user_id = "a1b2c3d4e5f6a1b2c3d4e5f6"

[device]
serial = "LPH62ABCD1234"
"#,
    );

    let config = LetPotConfig::load_from_file(temp_file.path()).unwrap();
    let client = DeviceClient::from_config(&config).unwrap();

    assert_eq!(client.identity().device_type(), "LPH62");
    assert_eq!(client.identity().model().unwrap().name, "LetPot Max");
}

#[test]
fn test_config_fails_when_file_missing() {
    let result = LetPotConfig::load_from_file(std::path::Path::new("/nonexistent/letpot.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_fails_with_malformed_toml() {
    let temp_file = write_config("[account\nemail = ");
    let result = LetPotConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_fails_without_device_section() {
    let temp_file = write_config(
        r#"
[account]
email = "email@example.com"
user_id = "a1b2c3d4e5f6a1b2c3d4e5f6"
"#,
    );
    let result = LetPotConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_rejects_out_of_range_values() {
    let cases = [
        ("mtu = 6", "broker"),
        ("mtu = 300", "broker"),
        ("path = \"mqttwss\"", "broker"),
        ("step_secs = 0", "reconnect"),
        ("pending_ttl_secs = 0", "status"),
    ];

    for (line, section) in cases {
        let temp_file = write_config(&format!(
            r#"
[account]
email = "email@example.com"
user_id = "a1b2c3d4e5f6a1b2c3d4e5f6"

[device]
serial = "LPH21ABCD1234"

[{section}]
{line}
"#
        ));

        let result = LetPotConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "expected {line} to be rejected"
        );
    }
}

#[test]
fn test_user_id_from_environment() {
    let temp_file = write_config(
        r#"
[account]
email = "email@example.com"
user_id_env = "LETPOT_TEST_USER_ID_FROM_ENV"

[device]
serial = "LPH21ABCD1234"
"#,
    );
    let config = LetPotConfig::load_from_file(temp_file.path()).unwrap();

    std::env::remove_var("LETPOT_TEST_USER_ID_FROM_ENV");
    assert!(matches!(
        config.account_identity(),
        Err(ConfigError::EnvVarNotFound(name)) if name == "LETPOT_TEST_USER_ID_FROM_ENV"
    ));

    std::env::set_var("LETPOT_TEST_USER_ID_FROM_ENV", "a1b2c3d4e5f6a1b2c3d4e5f6");
    let identity = config.account_identity().unwrap();
    assert_eq!(identity.user_id, "a1b2c3d4e5f6a1b2c3d4e5f6");
    assert_eq!(identity.email, "email@example.com");
    std::env::remove_var("LETPOT_TEST_USER_ID_FROM_ENV");
}
