//! Pure routing of rumqttc events and errors
//!
//! Turns library events into [`EventRoute`] decisions and library errors into
//! [`TransportError`] values with numeric reason codes.

use crate::transport::TransportError;
use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::{ClientError, ConnectionError, Event};

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => EventRoute::ConnectionAcknowledged {
                    reason_code: Self::connack_reason_code(connack.code),
                },
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.clone(),
                },
                Packet::Disconnect(disconnect) => EventRoute::Disconnected {
                    reason_code: disconnect.reason_code as u8,
                },
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// MQTT reason code carried by a CONNACK
    ///
    /// rumqttc's v5 return code enum has no wire discriminants, so the code
    /// is spelled out per variant. The first three variants only exist in
    /// MQTT 3.1.1 and keep their 3.1.1 values.
    pub fn connack_reason_code(code: ConnectReturnCode) -> u8 {
        match code {
            ConnectReturnCode::Success => 0x00,
            ConnectReturnCode::RefusedProtocolVersion => 0x01,
            ConnectReturnCode::BadClientId => 0x02,
            ConnectReturnCode::ServiceUnavailable => 0x03,
            ConnectReturnCode::UnspecifiedError => 0x80,
            ConnectReturnCode::MalformedPacket => 0x81,
            ConnectReturnCode::ProtocolError => 0x82,
            ConnectReturnCode::ImplementationSpecificError => 0x83,
            ConnectReturnCode::UnsupportedProtocolVersion => 0x84,
            ConnectReturnCode::ClientIdentifierNotValid => 0x85,
            ConnectReturnCode::BadUserNamePassword => 0x86,
            ConnectReturnCode::NotAuthorized => 0x87,
            ConnectReturnCode::ServerUnavailable => 0x88,
            ConnectReturnCode::ServerBusy => 0x89,
            ConnectReturnCode::Banned => 0x8A,
            ConnectReturnCode::BadAuthenticationMethod => 0x8C,
            ConnectReturnCode::TopicNameInvalid => 0x90,
            ConnectReturnCode::PacketTooLarge => 0x95,
            ConnectReturnCode::QuotaExceeded => 0x97,
            ConnectReturnCode::PayloadFormatInvalid => 0x99,
            ConnectReturnCode::RetainNotSupported => 0x9A,
            ConnectReturnCode::QoSNotSupported => 0x9B,
            ConnectReturnCode::UseAnotherServer => 0x9C,
            ConnectReturnCode::ServerMoved => 0x9D,
            ConnectReturnCode::ConnectionRateExceeded => 0x9F,
        }
    }

    /// Map an event loop error onto a transport error
    pub fn map_connection_error(error: ConnectionError) -> TransportError {
        match error {
            ConnectionError::ConnectionRefused(code) => {
                TransportError::ConnectionRefused(Self::connack_reason_code(code))
            }
            other => TransportError::ConnectionFailed(other.to_string()),
        }
    }

    pub fn map_publish_error(error: ClientError) -> TransportError {
        TransportError::PublishFailed(error.to_string())
    }

    pub fn map_subscribe_error(error: ClientError) -> TransportError {
        TransportError::SubscriptionFailed(error.to_string())
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRoute {
    /// ConnAck received; zero means accepted
    ConnectionAcknowledged { reason_code: u8 },
    /// Message received on a subscribed topic
    MessageReceived { topic: String, payload: Bytes },
    /// Broker sent DISCONNECT
    Disconnected { reason_code: u8 },
    /// Subscription confirmed
    SubscriptionConfirmed { packet_id: u16 },
    /// Infrastructure event (PingResp, PubAck, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}
