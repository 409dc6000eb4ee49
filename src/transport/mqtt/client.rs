//! Impure I/O operations for the MQTT transport
//!
//! [`MqttConnector`] opens one rumqttc connection per attempt and waits for
//! the broker's ConnAck. [`MqttTransport`] then drives the event loop from
//! `recv` while `publish`/`subscribe` queue requests on the client handle.
//! Reconnection is not handled here; the session manager discards a failed
//! transport and asks the connector for a new one.

use super::connection::configure_mqtt_options;
use super::message_handler::{EventRoute, MessageHandler};
use crate::transport::{ConnectOptions, Connector, InboundMessage, Transport, TransportError};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use rumqttc::TlsConfiguration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Capacity of the rumqttc request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Opens secure websocket MQTT v5 connections
///
/// The TLS configuration is built once and shared by every connection.
#[derive(Clone)]
pub struct MqttConnector {
    tls: TlsConfiguration,
}

impl MqttConnector {
    /// Connector trusting the system root certificates
    pub fn new() -> Self {
        Self::with_tls(TlsConfiguration::default())
    }

    pub fn with_tls(tls: TlsConfiguration) -> Self {
        Self { tls }
    }

    /// Poll the event loop until the broker answers the CONNECT
    async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), TransportError> {
        loop {
            let event = event_loop
                .poll()
                .await
                .map_err(MessageHandler::map_connection_error)?;

            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::ConnectionAcknowledged { reason_code: 0 } => return Ok(()),
                EventRoute::ConnectionAcknowledged { reason_code } => {
                    return Err(TransportError::ConnectionRefused(reason_code));
                }
                EventRoute::Disconnected { reason_code } => {
                    return Err(TransportError::DisconnectedByBroker(reason_code));
                }
                route => {
                    debug!(target: "mqtt_transport", "Event before ConnAck: {:?}", route);
                }
            }
        }
    }
}

impl Default for MqttConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MqttConnector {
    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let mqtt_options = configure_mqtt_options(options, &self.tls)?;
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        tokio::time::timeout(
            options.connect_timeout,
            Self::wait_for_connack(&mut event_loop),
        )
        .await
        .map_err(|_| TransportError::Timeout(options.connect_timeout))??;

        info!(
            client_id = %options.client_id,
            host = %options.host,
            "Connected to MQTT broker"
        );

        Ok(Arc::new(MqttTransport {
            client,
            event_loop: Mutex::new(event_loop),
        }))
    }
}

/// One established MQTT connection
pub struct MqttTransport {
    client: AsyncClient,
    event_loop: Mutex<EventLoop>,
}

#[async_trait]
impl Transport for MqttTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(topic.to_string(), QoS::AtMostOnce)
            .await
            .map_err(MessageHandler::map_subscribe_error)
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        self.client
            .publish(topic.to_string(), QoS::AtMostOnce, false, payload)
            .await
            .map_err(MessageHandler::map_publish_error)
    }

    async fn recv(&self) -> Result<InboundMessage, TransportError> {
        let mut event_loop = self.event_loop.lock().await;
        loop {
            let event = event_loop
                .poll()
                .await
                .map_err(MessageHandler::map_connection_error)?;

            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::MessageReceived { topic, payload } => {
                    return Ok(InboundMessage { topic, payload });
                }
                EventRoute::Disconnected { reason_code } => {
                    return Err(TransportError::DisconnectedByBroker(reason_code));
                }
                EventRoute::SubscriptionConfirmed { packet_id } => {
                    debug!(target: "mqtt_transport", "Subscription confirmed: {}", packet_id);
                }
                EventRoute::InfrastructureEvent(event) => {
                    debug!(target: "mqtt_transport", "MQTT event: {}", event);
                }
                EventRoute::ConnectionAcknowledged { .. } | EventRoute::OutgoingEvent => {}
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))
    }
}
