//! Error taxonomy for LetPot device sessions
//!
//! Errors fall into three kinds:
//! - authentication failures, which end the session and are never retried
//! - transport failures, which the session recovers from with backoff
//! - precondition failures, which are local to the command that raised them

use crate::config::ConfigError;
use crate::protocol::FrameError;
use crate::transport::TransportError;
use thiserror::Error;

/// Main error type for device client operations
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("MQTT auth error: {0}")]
    Authentication(#[source] TransportError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Missing client to publish message with")]
    NotConnected,

    #[error("Client doesn't have a status to update")]
    NoStatus,

    #[error("Unsupported device type: {0}")]
    UnsupportedDevice(String),

    #[error("Device doesn't support setting light brightness to {0}")]
    UnsupportedBrightness(u16),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Coarse classification of a [`DeviceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broker rejected the credentials; terminal
    Authentication,
    /// Connection, publish or subscribe failure; recoverable
    Transport,
    /// The command could not be issued in the current state
    Precondition,
}

impl DeviceError {
    /// Map the error onto its kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::Authentication(_) => ErrorKind::Authentication,
            DeviceError::Transport(_) => ErrorKind::Transport,
            DeviceError::NotConnected
            | DeviceError::NoStatus
            | DeviceError::UnsupportedDevice(_)
            | DeviceError::UnsupportedBrightness(_)
            | DeviceError::Frame(_)
            | DeviceError::Config(_) => ErrorKind::Precondition,
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Create unsupported device error
    pub fn unsupported_device<S: Into<String>>(device_type: S) -> Self {
        Self::UnsupportedDevice(device_type.into())
    }
}

/// Result type for device client operations
pub type DeviceResult<T> = Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DeviceError::Authentication(TransportError::ConnectionRefused(135)).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            DeviceError::Transport(TransportError::Closed).kind(),
            ErrorKind::Transport
        );
        assert_eq!(DeviceError::NotConnected.kind(), ErrorKind::Precondition);
        assert_eq!(DeviceError::NoStatus.kind(), ErrorKind::Precondition);
        assert_eq!(
            DeviceError::UnsupportedBrightness(42).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            DeviceError::unsupported_device("ABC12").kind(),
            ErrorKind::Precondition
        );
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(DeviceError::Transport(TransportError::Closed).is_retryable());
        assert!(!DeviceError::Authentication(TransportError::ConnectionRefused(134)).is_retryable());
        assert!(!DeviceError::NoStatus.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DeviceError::NoStatus.to_string(),
            "Client doesn't have a status to update"
        );
        assert_eq!(
            DeviceError::UnsupportedBrightness(300).to_string(),
            "Device doesn't support setting light brightness to 300"
        );
        assert_eq!(
            DeviceError::unsupported_device("XYZ99").to_string(),
            "Unsupported device type: XYZ99"
        );
        assert!(DeviceError::Authentication(TransportError::ConnectionRefused(135))
            .to_string()
            .contains("135"));
    }

    #[test]
    fn test_transport_error_converts() {
        let error: DeviceError = TransportError::PublishFailed("queue full".to_string()).into();
        assert!(matches!(error, DeviceError::Transport(_)));
    }
}
