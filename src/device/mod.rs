//! Device client: the public command surface for one garden
//!
//! ```rust,no_run
//! use letpot::{AccountIdentity, DeviceClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> letpot::DeviceResult<()> {
//! let account = AccountIdentity::new("a1b2c3d4e5f6a1b2c3d4e5f6", "me@example.com");
//! let client = Arc::new(DeviceClient::new(&account, "LPH21ABCD1234")?);
//!
//! let session = Arc::clone(&client);
//! tokio::spawn(async move {
//!     session.subscribe(|status| println!("{status:?}")).await
//! });
//!
//! client.set_power(true).await?;
//! # Ok(())
//! # }
//! ```

pub mod pending;

pub use pending::{PendingStatusTracker, DEFAULT_PENDING_TTL};

use crate::config::LetPotConfig;
use crate::converters::{converter_for, DeviceConverter};
use crate::credentials::BrokerCredentials;
use crate::error::{DeviceError, DeviceResult};
use crate::models::{AccountIdentity, DeviceIdentity, DeviceStatus};
use crate::protocol::FrameEncoder;
use crate::session::{ReconnectPolicy, SessionManager, SessionSettings, SessionState};
use crate::transport::{Connector, MqttConnector};
use chrono::NaiveTime;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, Instrument};

/// Client for one LetPot device
pub struct DeviceClient {
    identity: DeviceIdentity,
    converter: &'static dyn DeviceConverter,
    tracker: Arc<PendingStatusTracker>,
    session: SessionManager,
}

impl DeviceClient {
    /// Client for `serial` with default broker settings
    ///
    /// Builds its own TLS configuration; processes running several clients
    /// should share one [`MqttConnector`] through
    /// [`with_connector`](Self::with_connector).
    pub fn new(account: &AccountIdentity, serial: &str) -> DeviceResult<Self> {
        let config = LetPotConfig::new(&account.email, &account.user_id, serial);
        Self::build(&config, account, Arc::new(MqttConnector::new()))
    }

    /// Client configured from a loaded configuration file, with its own
    /// [`MqttConnector`]
    pub fn from_config(config: &LetPotConfig) -> DeviceResult<Self> {
        Self::with_connector(config, Arc::new(MqttConnector::new()))
    }

    /// Client using a custom connector, e.g. an in-memory broker in tests
    pub fn with_connector(
        config: &LetPotConfig,
        connector: Arc<dyn Connector>,
    ) -> DeviceResult<Self> {
        let account = config.account_identity()?;
        Self::build(config, &account, connector)
    }

    fn build(
        config: &LetPotConfig,
        account: &AccountIdentity,
        connector: Arc<dyn Connector>,
    ) -> DeviceResult<Self> {
        config.validate()?;

        let serial = &config.device.serial;
        let device_type = crate::models::device_type_of(serial);
        let converter = converter_for(&device_type)
            .ok_or_else(|| DeviceError::unsupported_device(device_type.as_str()))?;
        let identity = DeviceIdentity::new(serial, converter.device_model(&device_type));
        debug!(
            serial = %serial,
            converter = converter.name(),
            "Selected device converter"
        );

        let tracker = Arc::new(PendingStatusTracker::new(config.status.pending_ttl()));
        let settings = SessionSettings {
            host: config.broker.host.clone(),
            port: config.broker.port,
            path: config.broker.path.clone(),
            keep_alive: config.broker.keep_alive(),
            connect_timeout: config.broker.connect_timeout(),
            policy: ReconnectPolicy::from(&config.reconnect),
        };
        let session = SessionManager::new(
            identity.clone(),
            BrokerCredentials::derive(account),
            settings,
            connector,
            converter,
            Arc::clone(&tracker),
            FrameEncoder::new(config.broker.mtu)?,
        );

        Ok(Self {
            identity,
            converter,
            tracker,
            session,
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Run the device session, calling `callback` with every status report
    ///
    /// Reconnects on transport failures and only returns on shutdown
    /// (`Ok`) or when the broker rejects the credentials
    /// ([`DeviceError::Authentication`]).
    pub async fn subscribe<F>(&self, callback: F) -> DeviceResult<()>
    where
        F: Fn(DeviceStatus) + Send + Sync,
    {
        self.session.run(callback).await
    }

    /// Stop the session started by [`subscribe`](Self::subscribe)
    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.session.watch_state()
    }

    /// Brightness levels accepted by [`set_light_brightness`](Self::set_light_brightness)
    pub fn light_brightness_levels(&self) -> Vec<u16> {
        self.converter
            .light_brightness_levels(self.identity.device_type())
    }

    /// Last status reported by the device
    pub fn last_status(&self) -> Option<DeviceStatus> {
        self.tracker.last_status()
    }

    /// Status the next command will be based on
    pub fn baseline(&self) -> DeviceResult<DeviceStatus> {
        self.tracker.baseline()
    }

    pub async fn set_power(&self, on: bool) -> DeviceResult<()> {
        self.update_status("power", |status| DeviceStatus {
            system_on: on,
            ..status
        })
        .await
    }

    /// Set the light mode (0 flower, 1 vegetable)
    pub async fn set_light_mode(&self, mode: u8) -> DeviceResult<()> {
        self.update_status("light_mode", |status| DeviceStatus {
            light_mode: mode,
            ..status
        })
        .await
    }

    pub async fn set_light_brightness(&self, level: u16) -> DeviceResult<()> {
        if !self.light_brightness_levels().contains(&level) {
            return Err(DeviceError::UnsupportedBrightness(level));
        }

        self.update_status("light_brightness", |status| DeviceStatus {
            light_brightness: Some(level),
            ..status
        })
        .await
    }

    /// Set the light schedule; `None` keeps the current start or end time
    pub async fn set_light_schedule(
        &self,
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
    ) -> DeviceResult<()> {
        self.update_status("light_schedule", |status| DeviceStatus {
            light_schedule_start: start.unwrap_or(status.light_schedule_start),
            light_schedule_end: end.unwrap_or(status.light_schedule_end),
            ..status
        })
        .await
    }

    pub async fn set_plant_days(&self, days: u16) -> DeviceResult<()> {
        self.update_status("plant_days", |status| DeviceStatus {
            plant_days: days,
            ..status
        })
        .await
    }

    /// Set the pump mode (on means scheduled)
    pub async fn set_pump_mode(&self, on: bool) -> DeviceResult<()> {
        self.update_status("pump_mode", |status| DeviceStatus {
            pump_mode: u8::from(on),
            ..status
        })
        .await
    }

    pub async fn set_sound(&self, on: bool) -> DeviceResult<()> {
        self.update_status("sound", |status| DeviceStatus {
            system_sound: Some(on),
            ..status
        })
        .await
    }

    /// Apply `change` to the baseline, publish it and remember it as pending
    async fn update_status<C>(&self, field: &'static str, change: C) -> DeviceResult<()>
    where
        C: FnOnce(DeviceStatus) -> DeviceStatus + Send,
    {
        let span = crate::command_span!(serial = %self.identity.serial(), field);

        async {
            let status = change(self.tracker.baseline()?);
            let message = self.converter.update_status_message(&status);
            self.session.publish(&message).await?;
            self.tracker.set_pending(status).await;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

impl Drop for DeviceClient {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}
