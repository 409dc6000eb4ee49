//! Device session management
//!
//! [`SessionManager`] owns the broker connection for one device. Its life-cycle
//! loop connects, subscribes to the device's data topic, requests the current
//! status and dispatches inbound reports until the connection fails. Failures
//! are classified by [`lifecycle::LifecycleMonitor`]: rejected credentials end
//! the loop, anything else is retried after a linear backoff.

pub mod lifecycle;

pub use lifecycle::{
    FailureClass, LifecycleMonitor, ReconnectPolicy, SessionState, AUTH_FAILURE_CODES,
    DISCONNECT_AUTH_FAILURE_CODES,
};

use crate::converters::DeviceConverter;
use crate::credentials::BrokerCredentials;
use crate::device::pending::PendingStatusTracker;
use crate::error::{DeviceError, DeviceResult};
use crate::models::{DeviceIdentity, DeviceStatus};
use crate::protocol::{DeviceTopics, Frame, FrameEncoder, MAINTYPE_DATA, SUBTYPE_CUSTOM};
use crate::session_span;
use crate::transport::mqtt::generate_client_id;
use crate::transport::{ConnectOptions, Connector, Transport, TransportError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, trace, Instrument};

/// Broker endpoint and timing for a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub policy: ReconnectPolicy,
}

/// Owns the broker connection of one device
pub struct SessionManager {
    identity: DeviceIdentity,
    topics: DeviceTopics,
    credentials: BrokerCredentials,
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    converter: &'static dyn DeviceConverter,
    tracker: Arc<PendingStatusTracker>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    encoder: Mutex<FrameEncoder>,
    failures: AtomicU32,
    state_tx: watch::Sender<SessionState>,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: DeviceIdentity,
        credentials: BrokerCredentials,
        settings: SessionSettings,
        connector: Arc<dyn Connector>,
        converter: &'static dyn DeviceConverter,
        tracker: Arc<PendingStatusTracker>,
        encoder: FrameEncoder,
    ) -> Self {
        let topics = DeviceTopics::for_serial(identity.serial());
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            identity,
            topics,
            credentials,
            settings,
            connector,
            converter,
            tracker,
            transport: RwLock::new(None),
            encoder: Mutex::new(encoder),
            failures: AtomicU32::new(0),
            state_tx,
            shutdown_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Watch session state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Ask the life-cycle loop to stop; it returns `Ok(())` once it has
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            LifecycleMonitor::log_state_transition(self.identity.serial(), &previous, &next);
        }
    }

    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            client_id: generate_client_id(),
            host: self.settings.host.clone(),
            port: self.settings.port,
            path: self.settings.path.clone(),
            username: self.credentials.username.clone(),
            password: self.credentials.password.clone(),
            keep_alive: self.settings.keep_alive,
            connect_timeout: self.settings.connect_timeout,
        }
    }

    /// Run the life-cycle loop until shutdown or an authentication failure
    ///
    /// `callback` is invoked with every status report the device sends.
    pub async fn run<F>(&self, callback: F) -> DeviceResult<()>
    where
        F: Fn(DeviceStatus) + Send + Sync,
    {
        let span = session_span!(serial = %self.identity.serial());
        self.run_loop(&callback).instrument(span).await
    }

    async fn run_loop<F>(&self, callback: &F) -> DeviceResult<()>
    where
        F: Fn(DeviceStatus) + Send + Sync,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }
            self.set_state(SessionState::Connecting);

            let outcome = tokio::select! {
                result = self.run_connection(callback) => Some(result),
                _ = wait_for_shutdown(&mut shutdown_rx) => None,
            };

            // The connection is gone whatever happens next
            let transport = self.transport.write().await.take();

            let error = match outcome {
                None => {
                    if let Some(transport) = transport {
                        if let Err(e) = transport.disconnect().await {
                            debug!("Disconnect during shutdown failed: {}", e);
                        }
                    }
                    break;
                }
                Some(Ok(())) => TransportError::Closed,
                Some(Err(e)) => e,
            };

            match LifecycleMonitor::classify(&error) {
                FailureClass::Authentication => {
                    error!(reason_code = ?error.reason_code(), "MQTT auth error: {}", error);
                    self.set_state(SessionState::AuthFailed);
                    return Err(DeviceError::Authentication(error));
                }
                FailureClass::Recoverable => {
                    let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                    let next = LifecycleMonitor::next_state(
                        FailureClass::Recoverable,
                        failures,
                        &self.settings.policy,
                    );
                    let delay = self.settings.policy.delay_for(failures);

                    error!(
                        attempt = failures,
                        delay_secs = delay.as_secs(),
                        "MQTT error, reconnecting in {} seconds: {}",
                        delay.as_secs(),
                        error
                    );
                    self.set_state(next);

                    if !interruptible_sleep(&mut shutdown_rx, delay).await {
                        break;
                    }
                }
            }
        }

        info!("Device session stopped");
        self.set_state(SessionState::Disconnected);
        Ok(())
    }

    /// One connection: connect, subscribe, then dispatch until failure
    async fn run_connection<F>(&self, callback: &F) -> Result<(), TransportError>
    where
        F: Fn(DeviceStatus) + Send + Sync,
    {
        let transport = self.connector.connect(&self.connect_options()).await?;

        self.encoder.lock().await.reset();
        self.failures.store(0, Ordering::SeqCst);
        *self.transport.write().await = Some(Arc::clone(&transport));

        transport.subscribe(&self.topics.data).await?;
        info!(topic = %self.topics.data, "Subscribed to device data");
        self.set_state(SessionState::Running);

        tokio::try_join!(
            self.dispatch(transport.as_ref(), callback),
            self.request_current_status(transport.as_ref()),
        )?;
        Ok(())
    }

    async fn request_current_status(&self, transport: &dyn Transport) -> Result<(), TransportError> {
        let message = self.converter.current_status_message();
        self.send(transport, &message).await.map_err(|e| match e {
            DeviceError::Transport(e) => e,
            other => TransportError::PublishFailed(other.to_string()),
        })
    }

    /// Forward inbound payloads to the converter until the connection fails
    async fn dispatch<F>(&self, transport: &dyn Transport, callback: &F) -> Result<(), TransportError>
    where
        F: Fn(DeviceStatus) + Send + Sync,
    {
        loop {
            let message = transport.recv().await?;
            if message.topic != self.topics.data {
                debug!(topic = %message.topic, "Ignoring message on unexpected topic");
                continue;
            }

            if let Ok(frame) = Frame::from_hex(&message.payload) {
                trace!(
                    sequence = frame.sequence,
                    maintype = frame.maintype,
                    subtype = frame.subtype,
                    len = frame.payload.len(),
                    "Inbound frame"
                );
            }

            match self.converter.convert_hex_to_status(&message.payload) {
                Some(status) => {
                    self.tracker.confirm(status.clone());
                    callback(status);
                }
                None => debug!("Ignoring payload that is not a status report"),
            }
        }
    }

    /// Frame a device message and publish it to the command topic
    ///
    /// Fails with [`DeviceError::NotConnected`] when no connection is up.
    pub async fn publish(&self, message: &[u8]) -> DeviceResult<()> {
        let transport = self
            .transport
            .read()
            .await
            .clone()
            .ok_or(DeviceError::NotConnected)?;
        self.send(transport.as_ref(), message).await
    }

    async fn send(&self, transport: &dyn Transport, message: &[u8]) -> DeviceResult<()> {
        // Held across publishes so frames of one message keep their order
        let mut encoder = self.encoder.lock().await;
        let frames = encoder.encode(MAINTYPE_DATA, SUBTYPE_CUSTOM, message)?;

        for frame in frames {
            debug!(topic = %self.topics.command, frame = %frame, "Publishing frame");
            transport.publish(&self.topics.command, frame).await?;
        }
        Ok(())
    }
}

/// Resolve once shutdown has been requested
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            // Sender gone: nobody can request shutdown any more
            std::future::pending::<()>().await;
        }
    }
}

/// Perform interruptible sleep with shutdown monitoring
/// Returns true if sleep completed, false if shutdown requested
async fn interruptible_sleep(shutdown_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = wait_for_shutdown(shutdown_rx) => {
            info!("Shutdown signal received during reconnection delay, stopping");
            false
        }
        _ = tokio::time::sleep(delay) => true,
    }
}
