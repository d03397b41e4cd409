//! Error types for the counting game client
//!
//! Failure taxonomy:
//! - [`ResourceLoadError`]: an audio asset failed to fetch or decode.
//!   Recoverable by speaking a scripted phrase (best-effort cues) or
//!   propagated (strict cues).
//! - [`ConnectionError`]: transport failure. Retried with bounded backoff;
//!   only `Exhausted` is user-facing. `Rejected` sends are dropped, never
//!   retried.
//! - [`Error::UnexpectedEvent`]: protocol-valid event arriving in the wrong
//!   phase. Counted and ignored.
//! - [`PlaybackError`]: the platform refused to start output. Deferred until
//!   the next user gesture, never fatal.

use countgame_common::GamePhase;
use thiserror::Error;

/// Audio asset failed to resolve, fetch or decode
///
/// `Clone` so that every caller joined on one in-flight load observes the
/// identical failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceLoadError {
    /// Asset id has no catalog entry
    #[error("Unknown audio asset: {0}")]
    UnknownAsset(String),

    /// Bytes could not be fetched
    #[error("Failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    /// Bytes fetched but not playable
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Platform refused or failed to start audio/speech
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Output blocked until a user interaction (autoplay policy)
    #[error("Playback not allowed: {0}")]
    NotAllowed(String),

    /// Output device or engine failure
    #[error("Audio output error: {0}")]
    Output(String),
}

/// Connection to the game server failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Could not establish the connection
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Established connection broke
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server refused an outbound event (4xx); resending cannot succeed
    #[error("Event rejected by server: {0}")]
    Rejected(String),

    /// Server closed the stream
    #[error("Connection closed by server")]
    Closed,

    /// Retry budget used up; no further automatic retries
    #[error("Unable to connect after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Main error type for the client
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors (including unknown cue ids)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio asset errors
    #[error(transparent)]
    ResourceLoad(#[from] ResourceLoadError),

    /// Audio output errors
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// Connectivity errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Event valid in the protocol but not in the current phase
    #[error("Unexpected event '{event}' in phase {phase}")]
    UnexpectedEvent { phase: GamePhase, event: &'static str },

    /// Wire format errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<countgame_common::Error> for Error {
    fn from(err: countgame_common::Error) -> Self {
        match err {
            countgame_common::Error::Config(msg) => Error::Config(msg),
            countgame_common::Error::Io(e) => Error::Io(e),
            other => Error::Protocol(other.to_string()),
        }
    }
}

/// Convenience Result type using the client Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_config_error_maps_to_config() {
        let err: Error = countgame_common::Error::Config("bad".into()).into();
        assert!(matches!(err, Error::Config(msg) if msg == "bad"));
    }

    #[test]
    fn test_common_protocol_error_maps_to_protocol() {
        let err: Error = countgame_common::Error::Protocol("nope".into()).into();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_unexpected_event_message() {
        let err = Error::UnexpectedEvent {
            phase: GamePhase::Setup,
            event: "number_started",
        };
        assert_eq!(err.to_string(), "Unexpected event 'number_started' in phase setup");
    }
}
