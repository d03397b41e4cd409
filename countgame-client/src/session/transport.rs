//! Transport seam
//!
//! A [`Connector`] opens one connection attempt; the resulting [`Transport`]
//! carries typed events both ways until it fails or is closed. The session
//! connector only ever talks to these traits, which keeps reconnect logic
//! testable with scripted transports.
//!
//! The production implementation speaks Server-Sent Events for inbound
//! traffic (`GET {events_url}`) and JSON POSTs for outbound traffic
//! (`POST {events_url}`, body `{"event": ..., "data": {...}}`). A POST
//! answered with 4xx is reported as [`ConnectionError::Rejected`]; any
//! other failure is a [`ConnectionError::Transport`] error.
//!
//! This is not Socket.IO. The stock Flask-SocketIO game server does not
//! serve these routes; it needs a bridge that exposes the same event names
//! and payloads over SSE and POST at `{server_url}/events`.

use crate::error::ConnectionError;
use crate::events::{ClientEvent, ServerEvent};
use async_trait::async_trait;
use countgame_common::sse::SseDecoder;
use futures::stream::{BoxStream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// One established connection
#[async_trait]
pub trait Transport: Send {
    /// Send one outbound event
    async fn send(&mut self, event: &ClientEvent) -> Result<(), ConnectionError>;

    /// Next inbound event. `None` when the server closed the connection.
    ///
    /// Must be cancel-safe: it is polled inside `tokio::select!`.
    async fn recv(&mut self) -> Option<Result<ServerEvent, ConnectionError>>;

    async fn close(&mut self);
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, ConnectionError>;
}

/// SSE + POST connector
pub struct SseConnector {
    client: reqwest::Client,
    events_url: String,
    connect_timeout: Duration,
}

impl SseConnector {
    pub fn new(client: reqwest::Client, events_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            client,
            events_url: events_url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ConnectionError> {
        debug!("Connecting to {}", self.events_url);

        let request = self
            .client
            .get(&self.events_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();

        let response = tokio::time::timeout(self.connect_timeout, request)
            .await
            .map_err(|_| {
                ConnectionError::Connect(format!(
                    "timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| ConnectionError::Connect(e.to_string()))?
            .error_for_status()
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(Box::new(SseTransport {
            client: self.client.clone(),
            events_url: self.events_url.clone(),
            stream,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }))
    }
}

/// Streaming SSE reader plus POST sender
pub struct SseTransport {
    client: reqwest::Client,
    events_url: String,
    stream: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    /// Events decoded from a chunk but not yet returned
    ready: VecDeque<ServerEvent>,
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&mut self, event: &ClientEvent) -> Result<(), ConnectionError> {
        debug!("→ {}", event.name());
        let response = self
            .client
            .post(&self.events_url)
            .json(event)
            .send()
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ConnectionError::Rejected(format!("{} → {}", event.name(), status)));
        }
        if !status.is_success() {
            return Err(ConnectionError::Transport(format!("{} → {}", event.name(), status)));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent, ConnectionError>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    for frame in self.decoder.push(&chunk) {
                        let Some(name) = frame.event.as_deref() else {
                            trace!("Ignoring unnamed SSE frame");
                            continue;
                        };
                        match ServerEvent::from_parts(name, &frame.data) {
                            Ok(event) => self.ready.push_back(event),
                            Err(e) => warn!("Dropping malformed '{}' event: {}", name, e),
                        }
                    }
                }
                Some(Err(e)) => return Some(Err(ConnectionError::Transport(e.to_string()))),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        self.stream = futures::stream::empty().boxed();
        self.ready.clear();
    }
}
