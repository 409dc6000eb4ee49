//! Transport layer for device sessions
//!
//! The session manager talks to the broker only through the [`Connector`] and
//! [`Transport`] traits, so the MQTT implementation in [`mqtt`] can be swapped
//! for the in-memory one in [`crate::testing`].

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod mqtt;

pub use mqtt::MqttConnector;

/// Transport level failures
///
/// Broker reason codes are kept numeric so the session layer can classify
/// them without depending on the MQTT library types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection refused by broker (reason code {0})")]
    ConnectionRefused(u8),
    #[error("Disconnected by broker (reason code {0})")]
    DisconnectedByBroker(u8),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Publishing failed: {0}")]
    PublishFailed(String),
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),
    #[error("No ConnAck within {0:?}")]
    Timeout(Duration),
    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Broker supplied reason code, if the failure carries one
    pub fn reason_code(&self) -> Option<u8> {
        match self {
            TransportError::ConnectionRefused(code) | TransportError::DisconnectedByBroker(code) => {
                Some(*code)
            }
            _ => None,
        }
    }
}

/// Message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Everything needed to open one broker connection
#[derive(Clone)]
pub struct ConnectOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("client_id", &self.client_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("keep_alive", &self.keep_alive)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// An established broker connection
///
/// One reader (`recv`) and any number of writers may use the connection
/// concurrently.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Publish a text payload to a topic
    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError>;

    /// Wait for the next message on a subscribed topic
    ///
    /// Returns an error once the connection is lost; the transport is unusable
    /// afterwards.
    async fn recv(&self) -> Result<InboundMessage, TransportError>;

    /// Close the connection
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Opens broker connections
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Connect and wait for the broker to accept the session
    async fn connect(&self, options: &ConnectOptions)
        -> Result<Arc<dyn Transport>, TransportError>;
}
