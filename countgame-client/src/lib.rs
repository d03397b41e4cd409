//! Counting game client library
//!
//! Client core for a camera-gesture counting game: a deduplicating audio
//! asset cache with speech fallback, a playback controller, a reconnecting
//! session connector and the phase state machine that ties them together.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod session;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use game::{PhaseStateMachine, UserAction};
pub use session::{SessionConnector, SessionHandle};
