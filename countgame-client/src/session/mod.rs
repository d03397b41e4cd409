//! Connection to the game server
//!
//! - `backoff`: reconnect delay policy
//! - `transport`: connector/transport seam and the SSE + HTTP POST implementation
//! - `connector`: background task that owns the connection, reconnects with
//!   backoff and delivers events in arrival order

pub mod backoff;
pub mod connector;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use connector::{
    ConnectionSignal, ConnectionState, SessionConnector, SessionHandle, SessionInput,
    SessionTask,
};
pub use transport::{Connector, SseConnector, Transport};
