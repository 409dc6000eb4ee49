//! In-memory broker for testing device sessions
//!
//! [`MockConnector`] plays the role of the broker endpoint: it records every
//! connection attempt, fails attempts according to a script and otherwise
//! hands out a [`MockTransport`]. Each established connection is controlled
//! from the test through its [`MockBroker`] handle.

use crate::transport::{ConnectOptions, Connector, InboundMessage, Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

type Inbound = Result<InboundMessage, TransportError>;
type Published = Arc<watch::Sender<Vec<(String, String)>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record of one connection attempt
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub at: Instant,
    pub options: ConnectOptions,
}

#[derive(Default)]
struct ConnectorShared {
    script: Mutex<VecDeque<TransportError>>,
    attempts: Mutex<Vec<ConnectAttempt>>,
}

/// Scripted connector handing out in-memory transports
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<ConnectorShared>,
    brokers: Arc<watch::Sender<Vec<MockBroker>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        let (brokers, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(ConnectorShared::default()),
            brokers: Arc::new(brokers),
        }
    }

    /// Queue `error` as the outcome of the next connection attempt
    pub fn fail_next(&self, error: TransportError) -> &Self {
        lock(&self.shared.script).push_back(error);
        self
    }

    /// Number of connection attempts so far
    pub fn attempts(&self) -> usize {
        lock(&self.shared.attempts).len()
    }

    pub fn attempt_log(&self) -> Vec<ConnectAttempt> {
        lock(&self.shared.attempts).clone()
    }

    /// Number of connections established so far
    pub fn connections(&self) -> usize {
        self.brokers.borrow().len()
    }

    /// Wait until connection number `n` (1-based) is established
    pub async fn wait_for_connection(&self, n: usize) -> MockBroker {
        let mut brokers = self.brokers.subscribe();
        loop {
            if let Some(broker) = brokers.borrow_and_update().get(n.saturating_sub(1)) {
                return broker.clone();
            }
            if brokers.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        lock(&self.shared.attempts).push(ConnectAttempt {
            at: Instant::now(),
            options: options.clone(),
        });

        if let Some(error) = lock(&self.shared.script).pop_front() {
            return Err(error);
        }

        let (transport, broker) = MockTransport::pair();
        self.brokers.send_modify(|brokers| brokers.push(broker));
        Ok(Arc::new(transport))
    }
}

/// Test-side handle of one established connection
#[derive(Clone)]
pub struct MockBroker {
    inbound: mpsc::UnboundedSender<Inbound>,
    published: Published,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MockBroker {
    /// Deliver a message to the client
    pub fn inject(&self, topic: &str, payload: impl Into<Bytes>) {
        let _ = self.inbound.send(Ok(InboundMessage {
            topic: topic.to_string(),
            payload: payload.into(),
        }));
    }

    /// Break the connection with `error`
    pub fn fail(&self, error: TransportError) {
        let _ = self.inbound.send(Err(error));
    }

    /// `(topic, payload)` pairs published by the client, in order
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.borrow().clone()
    }

    /// Wait until the client has published at least `n` payloads
    pub async fn wait_for_published(&self, n: usize) -> Vec<(String, String)> {
        let mut published = self.published.subscribe();
        loop {
            {
                let current = published.borrow_and_update();
                if current.len() >= n {
                    return current.clone();
                }
            }
            if published.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.subscriptions).clone()
    }
}

/// In-memory transport
pub struct MockTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    published: Published,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// A transport and the broker handle controlling it
    pub fn pair() -> (Self, MockBroker) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let published: Published = Arc::new(watch::channel(Vec::new()).0);
        let subscriptions: Arc<Mutex<Vec<String>>> = Arc::default();

        let transport = Self {
            inbound: tokio::sync::Mutex::new(inbound_rx),
            published: Arc::clone(&published),
            subscriptions: Arc::clone(&subscriptions),
        };
        let broker = MockBroker {
            inbound: inbound_tx,
            published,
            subscriptions,
        };
        (transport, broker)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        lock(&self.subscriptions).push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        self.published
            .send_modify(|published| published.push((topic.to_string(), payload)));
        Ok(())
    }

    async fn recv(&self) -> Result<InboundMessage, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(message) => message,
            None => Err(TransportError::Closed),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.inbound.lock().await.close();
        Ok(())
    }
}
