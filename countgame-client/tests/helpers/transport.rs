//! Channel-backed transports for session tests

use async_trait::async_trait;
use countgame_client::error::ConnectionError;
use countgame_client::events::{ClientEvent, ServerEvent};
use countgame_client::session::{Connector, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Test side of one connection: push server events, inspect client sends.
/// Dropping it closes the connection.
pub struct ServerEnd {
    pub events: mpsc::UnboundedSender<ServerEvent>,
    pub received: Arc<Mutex<Vec<ClientEvent>>>,
}

impl ServerEnd {
    pub fn push(&self, event: ServerEvent) {
        self.events.send(event).unwrap();
    }

    pub fn received(&self) -> Vec<ClientEvent> {
        self.received.lock().unwrap().clone()
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<ServerEvent>,
    received: Arc<Mutex<Vec<ClientEvent>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, event: &ClientEvent) -> Result<(), ConnectionError> {
        self.received.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent, ConnectionError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

/// Hands out scripted connect outcomes in order; refuses once the script
/// is exhausted.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<Option<MockTransport>>>,
    attempts: Mutex<u32>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next connect attempt fails
    pub fn refuse_next(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    /// Next connect attempt succeeds; returns the server side
    pub fn accept_next(&self) -> ServerEnd {
        let (events, inbound) = mpsc::unbounded_channel();
        let received = Arc::new(Mutex::new(Vec::new()));
        self.script.lock().unwrap().push_back(Some(MockTransport {
            inbound,
            received: Arc::clone(&received),
        }));
        ServerEnd { events, received }
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ConnectionError> {
        *self.attempts.lock().unwrap() += 1;
        match self.script.lock().unwrap().pop_front().flatten() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(ConnectionError::Connect("connection refused".to_string())),
        }
    }
}
