//! # Counting Game Common Library
//!
//! Shared code for the counting game client and anything that speaks its
//! protocol:
//! - Wire events (server → client and client → server tagged unions)
//! - Game phase and payload types
//! - Server-Sent Events frame codec
//! - Configuration file resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{ClientEvent, GamePhase, ServerEvent};
