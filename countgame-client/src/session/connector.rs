//! Session connector
//!
//! A background task owns the connection. It delivers inbound server events
//! and its own lifecycle signals on one unbounded channel, so consumers see
//! everything in arrival order and nothing is dropped. Outbound events are
//! queued on a second channel and sent once a transport is up.
//!
//! Reconnect policy: failures are retried with [`BackoffPolicy`] delays.
//! A loss after a successful connect starts a fresh retry sequence. When the
//! retry budget is spent the state becomes `Error` and a `Fatal` signal is
//! delivered; no further automatic attempts are made.
//!
//! A failed send does not tear the connection down; only the inbound stream
//! decides that. The event is resent after a backoff delay, holding back
//! later events so order is kept, and dropped after [`MAX_SEND_ATTEMPTS`].
//! Events the server rejects outright are dropped at once.

use super::backoff::BackoffPolicy;
use super::transport::{Connector, Transport};
use crate::error::ConnectionError;
use crate::events::{ClientEvent, ServerEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Retries exhausted (terminal)
    Error,
}

/// Lifecycle notifications, interleaved with server events
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionSignal {
    Connected,
    /// An established connection was lost
    Disconnected { reason: String },
    /// A connect attempt failed; retry `attempt` follows after `delay`
    Retrying {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// Retry budget spent
    Fatal { attempts: u32 },
}

/// Everything the session delivers, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Connection(ConnectionSignal),
    Server(ServerEvent),
}

/// Cloneable handle for sending events and observing connection state
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<ClientEvent>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl SessionHandle {
    /// Handle not backed by a connector task; outbound events land on the
    /// returned receiver.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        (Self { cmd_tx, state_rx }, cmd_rx)
    }

    /// Queue an outbound event. Queued events survive reconnects.
    pub fn send(&self, event: ClientEvent) -> Result<(), ConnectionError> {
        debug!("Queueing {}", event.name());
        self.cmd_tx.send(event).map_err(|_| ConnectionError::Closed)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

/// Running connector task
pub struct SessionTask {
    shutdown: CancellationToken,
    join: JoinHandle<ConnectionState>,
}

impl SessionTask {
    /// Close the connection and wait for the task; returns the final state
    pub async fn shutdown(self) -> ConnectionState {
        self.shutdown.cancel();
        self.join.await.unwrap_or(ConnectionState::Disconnected)
    }

    /// Wait for the task to end on its own (retries exhausted)
    pub async fn join(self) -> ConnectionState {
        self.join.await.unwrap_or(ConnectionState::Disconnected)
    }
}

/// Sends per outbound event before it is dropped
pub const MAX_SEND_ATTEMPTS: u32 = 3;

enum PumpExit {
    Shutdown,
    Lost(String),
}

/// Outbound event waiting for another send attempt
struct PendingSend {
    event: ClientEvent,
    failures: u32,
}

pub struct SessionConnector {
    connector: Arc<dyn Connector>,
    backoff: BackoffPolicy,
    input_tx: mpsc::UnboundedSender<SessionInput>,
    cmd_rx: mpsc::UnboundedReceiver<ClientEvent>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    attempt: u32,
    /// Outbound event whose send failed; later events wait behind it
    unsent: Option<PendingSend>,
}

impl SessionConnector {
    /// Spawn the connector task.
    ///
    /// Returns the outbound handle, the ordered input stream and the task.
    pub fn start(
        connector: Arc<dyn Connector>,
        backoff: BackoffPolicy,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionInput>, SessionTask) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();

        let session = Self {
            connector,
            backoff,
            input_tx,
            cmd_rx,
            state_tx,
            shutdown: shutdown.clone(),
            attempt: 0,
            unsent: None,
        };
        let join = tokio::spawn(session.run());

        (
            SessionHandle { cmd_tx, state_rx },
            input_rx,
            SessionTask { shutdown, join },
        )
    }

    async fn run(mut self) -> ConnectionState {
        loop {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = self.connector.connect() => result,
                _ = self.shutdown.cancelled() => return self.stop(),
            };

            let reason = match connected {
                Ok(transport) => {
                    self.attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    info!("Connected to game server");
                    self.deliver(SessionInput::Connection(ConnectionSignal::Connected));

                    match self.pump(transport).await {
                        PumpExit::Shutdown => return self.stop(),
                        PumpExit::Lost(reason) => {
                            warn!(reason = %reason, "Connection to game server lost");
                            self.set_state(ConnectionState::Disconnected);
                            self.deliver(SessionInput::Connection(ConnectionSignal::Disconnected {
                                reason: reason.clone(),
                            }));
                            reason
                        }
                    }
                }
                Err(e) => e.to_string(),
            };

            if !self.wait_before_retry(reason).await {
                return *self.state_tx.borrow();
            }
        }
    }

    /// Returns `false` when no retry should follow (budget spent or shutdown)
    async fn wait_before_retry(&mut self, reason: String) -> bool {
        if self.attempt >= self.backoff.max_attempts() {
            let err = ConnectionError::Exhausted {
                attempts: self.attempt,
            };
            error!(attempts = self.attempt, "{}", err);
            self.set_state(ConnectionState::Error);
            self.deliver(SessionInput::Connection(ConnectionSignal::Fatal {
                attempts: self.attempt,
            }));
            return false;
        }

        self.attempt += 1;
        let delay = self.backoff.delay(self.attempt);
        warn!(
            attempt = self.attempt,
            max_attempts = self.backoff.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "Reconnecting to game server"
        );
        self.set_state(ConnectionState::Disconnected);
        self.deliver(SessionInput::Connection(ConnectionSignal::Retrying {
            attempt: self.attempt,
            delay,
            reason,
        }));

        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.shutdown.cancelled() => {
                self.stop();
                false
            }
        }
    }

    async fn pump(&mut self, mut transport: Box<dyn Transport>) -> PumpExit {
        let mut resend_at = None;
        if let Some(pending) = self.unsent.take() {
            resend_at = self.send_event(&mut *transport, pending).await;
        }

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    transport.close().await;
                    return PumpExit::Shutdown;
                }

                incoming = transport.recv() => match incoming {
                    Some(Ok(event)) => {
                        debug!("← {}", event.name());
                        if self.input_tx.send(SessionInput::Server(event)).is_err() {
                            debug!("Session consumer gone, closing connection");
                            transport.close().await;
                            return PumpExit::Shutdown;
                        }
                    }
                    Some(Err(e)) => return PumpExit::Lost(e.to_string()),
                    None => return PumpExit::Lost(ConnectionError::Closed.to_string()),
                },

                _ = resend_due(resend_at) => {
                    resend_at = None;
                    if let Some(pending) = self.unsent.take() {
                        resend_at = self.send_event(&mut *transport, pending).await;
                    }
                }

                outbound = self.cmd_rx.recv(), if self.unsent.is_none() => match outbound {
                    Some(event) => {
                        resend_at = self
                            .send_event(&mut *transport, PendingSend { event, failures: 0 })
                            .await;
                    }
                    None => {
                        debug!("All session handles dropped, closing connection");
                        transport.close().await;
                        return PumpExit::Shutdown;
                    }
                },
            }
        }
    }

    /// Try one send. On a retryable failure the event is parked in `unsent`
    /// and the time of the next attempt is returned.
    async fn send_event(&mut self, transport: &mut dyn Transport, mut pending: PendingSend) -> Option<Instant> {
        debug!("→ {}", pending.event.name());
        match transport.send(&pending.event).await {
            Ok(()) => None,
            Err(e @ ConnectionError::Rejected(_)) => {
                warn!(event = pending.event.name(), "Dropping outbound event: {}", e);
                None
            }
            Err(e) => {
                pending.failures += 1;
                if pending.failures >= MAX_SEND_ATTEMPTS {
                    warn!(
                        event = pending.event.name(),
                        attempts = pending.failures,
                        "Dropping outbound event after repeated failures: {}",
                        e
                    );
                    return None;
                }
                let delay = self.backoff.delay(pending.failures);
                debug!(
                    event = pending.event.name(),
                    attempt = pending.failures,
                    delay_ms = delay.as_millis() as u64,
                    "Send failed, will retry: {}",
                    e
                );
                self.unsent = Some(pending);
                Some(Instant::now() + delay)
            }
        }
    }

    fn deliver(&self, input: SessionInput) {
        if self.input_tx.send(input).is_err() {
            debug!("Session consumer gone, dropping input");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn stop(&self) -> ConnectionState {
        info!("Session connector stopped");
        self.set_state(ConnectionState::Disconnected);
        ConnectionState::Disconnected
    }
}

/// Completes at `at`; never when nothing is scheduled
async fn resend_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
