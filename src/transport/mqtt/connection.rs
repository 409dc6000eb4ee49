//! Pure connection configuration for the MQTT client
//!
//! Builds client identifiers, the websocket broker URL and the rumqttc options
//! for one connection attempt.

use crate::transport::{ConnectOptions, TransportError};
use rumqttc::v5::MqttOptions;
use rumqttc::{TlsConfiguration, Transport as RumqttcTransport};
use url::Url;

/// Prefix of every generated client identifier
pub const CLIENT_ID_PREFIX: &str = "LetPot";

/// Generate a fresh client identifier: `LetPot_{epoch_millis}_{8 hex chars}`
pub fn generate_client_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{CLIENT_ID_PREFIX}_{millis}_{}", &suffix[..8])
}

/// Build the secure websocket URL for the broker
pub fn broker_url(options: &ConnectOptions) -> Result<Url, TransportError> {
    let raw = format!("wss://{}:{}{}", options.host, options.port, options.path);
    let url = Url::parse(&raw)
        .map_err(|e| TransportError::ConnectionFailed(format!("Invalid broker URL {raw}: {e}")))?;

    if url.host_str().is_none() {
        return Err(TransportError::ConnectionFailed(format!(
            "Invalid broker URL {raw}: missing host"
        )));
    }
    Ok(url)
}

/// Pure function to configure MQTT options for one connection attempt
///
/// rumqttc takes the full websocket URL in place of the host name when the
/// transport is a websocket.
pub fn configure_mqtt_options(
    options: &ConnectOptions,
    tls: &TlsConfiguration,
) -> Result<MqttOptions, TransportError> {
    let url = broker_url(options)?;

    let mut mqtt_options = MqttOptions::new(&options.client_id, url.as_str(), options.port);
    mqtt_options.set_transport(RumqttcTransport::wss_with_config(tls.clone()));
    mqtt_options.set_credentials(&options.username, &options.password);
    mqtt_options.set_keep_alive(options.keep_alive);

    Ok(mqtt_options)
}
