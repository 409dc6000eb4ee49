//! Pure life-cycle logic for device sessions
//!
//! Failure classification and backoff computation live here, free of I/O, so
//! the session loop in [`super::SessionManager`] only sequences them.

use crate::config::ReconnectSection;
use crate::transport::TransportError;
use std::time::Duration;
use tracing::{error, info, warn};

/// CONNACK codes that mean the credentials were rejected
///
/// 4 and 5 are the MQTT 3.1.1 "bad username or password" and "not
/// authorized" codes; 134 and 135 are the MQTT 5 reason codes for the same
/// conditions.
pub const AUTH_FAILURE_CODES: [u8; 4] = [4, 5, 134, 135];

/// DISCONNECT reason codes that mean the credentials were rejected
///
/// Only MQTT 5 sends a reason code with DISCONNECT; there 4 means
/// "disconnect with will message" and is not an authentication failure.
pub const DISCONNECT_AUTH_FAILURE_CODES: [u8; 1] = [135];

/// Observable state of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been started, or it was shut down
    Disconnected,
    /// Opening a broker connection
    Connecting,
    /// Connected and subscribed; statuses are being dispatched
    Running,
    /// Waiting `delay` before connection attempt number `attempt + 1`
    Reconnecting { attempt: u32, delay: Duration },
    /// The broker rejected the credentials; terminal
    AuthFailed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::AuthFailed)
    }
}

/// How a transport failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Stop the session and report the failure to the caller
    Authentication,
    /// Back off and reconnect
    Recoverable,
}

/// Backoff schedule: `min(failures * step, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub step: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(15),
            max_delay: Duration::from_secs(600),
        }
    }
}

impl From<&ReconnectSection> for ReconnectPolicy {
    fn from(section: &ReconnectSection) -> Self {
        Self {
            step: Duration::from_secs(section.step_secs),
            max_delay: Duration::from_secs(section.max_delay_secs),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnecting after `failures` consecutive failures
    pub fn delay_for(&self, failures: u32) -> Duration {
        self.step.saturating_mul(failures).min(self.max_delay)
    }
}

/// Pure failure classification and state transitions
pub struct LifecycleMonitor;

impl LifecycleMonitor {
    /// Classify a transport failure by its broker reason code
    pub fn classify(error: &TransportError) -> FailureClass {
        let rejected = match error {
            TransportError::ConnectionRefused(code) => AUTH_FAILURE_CODES.contains(code),
            TransportError::DisconnectedByBroker(code) => {
                DISCONNECT_AUTH_FAILURE_CODES.contains(code)
            }
            _ => false,
        };

        if rejected {
            FailureClass::Authentication
        } else {
            FailureClass::Recoverable
        }
    }

    /// State to enter after a failure, given the consecutive failure count
    /// including this one
    pub fn next_state(
        class: FailureClass,
        failures: u32,
        policy: &ReconnectPolicy,
    ) -> SessionState {
        match class {
            FailureClass::Authentication => SessionState::AuthFailed,
            FailureClass::Recoverable => SessionState::Reconnecting {
                attempt: failures,
                delay: policy.delay_for(failures),
            },
        }
    }

    /// Log a state transition (pure logging function)
    pub fn log_state_transition(serial: &str, from: &SessionState, to: &SessionState) {
        match (from, to) {
            (SessionState::Connecting, SessionState::Running) => {
                info!(serial, "Device session running");
            }
            (_, SessionState::Reconnecting { attempt, delay }) => {
                warn!(
                    serial,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "Device session lost"
                );
            }
            (_, to) if to.is_terminal() => {
                error!(serial, "Device session stopped: authentication rejected");
            }
            _ => {
                info!(serial, "Device session state: {:?} -> {:?}", from, to);
            }
        }
    }
}
