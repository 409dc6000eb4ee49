//! LetPot - session and protocol client for LetPot hydroponic gardens
//!
//! Gardens are controlled over MQTT v5 tunnelled through a secure websocket.
//! This crate provides:
//! - broker credential derivation from the account identity
//! - the length-prefixed frame protocol that carries device commands
//! - per-family converters between device bytes and [`DeviceStatus`]
//! - a self-healing device session with backoff and authentication handling
//! - [`DeviceClient`], the command surface (`set_power`, `set_light_mode`, ...)
//!
//! # Quick Start
//!
//! ```rust
//! use letpot::protocol::{FrameEncoder, MAINTYPE_DATA, SUBTYPE_CUSTOM};
//! use letpot::{AccountIdentity, BrokerCredentials};
//!
//! let account = AccountIdentity::new("a1b2c3d4e5f6a1b2c3d4e5f6", "email@example.com");
//! let credentials = BrokerCredentials::derive(&account);
//! assert_eq!(credentials.username, "email@example.com__letpot_v3");
//!
//! let mut encoder = FrameEncoder::default();
//! let frames = encoder.encode(MAINTYPE_DATA, SUBTYPE_CUSTOM, &[97, 1]).unwrap();
//! assert_eq!(frames, vec!["4d0000026101".to_string()]);
//! ```

pub mod config;
pub mod converters;
pub mod credentials;
pub mod device;
pub mod error;
pub mod models;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, LetPotConfig};
pub use converters::{converter_for, DeviceConverter, CONVERTERS};
pub use credentials::BrokerCredentials;
pub use device::{DeviceClient, PendingStatusTracker};
pub use error::{DeviceError, DeviceResult, ErrorKind};
pub use models::{AccountIdentity, DeviceIdentity, DeviceModel, DeviceStatus};
pub use session::{SessionManager, SessionState};
pub use transport::{Connector, MqttConnector, Transport, TransportError};
