//! Wire protocol for LetPot device commands
//!
//! Commands are framed into transport-sized chunks ([`frame`]) and exchanged on
//! per-device topics ([`topics`]).

pub mod frame;
pub mod topics;

pub use frame::{
    Frame, FrameEncoder, FrameError, DEFAULT_MTU, HEADER_ROOM, MAINTYPE_DATA, SUBTYPE_CUSTOM,
};
pub use topics::{command_topic, data_topic, DeviceTopics};
