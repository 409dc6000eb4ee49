//! MQTT v5 over secure websocket, backed by rumqttc
//!
//! - [`connection`] - pure option building and client identifiers
//! - [`message_handler`] - pure event and error routing
//! - [`client`] - impure I/O: connecting and driving the event loop

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{MqttConnector, MqttTransport};
pub use connection::{broker_url, configure_mqtt_options, generate_client_id};
pub use message_handler::{EventRoute, MessageHandler};
