//! Test helper modules for countgame-client integration tests
//!
//! Provides reusable test infrastructure components:
//! - RecordingUi: captures every UI adapter call
//! - ScriptedLoader: in-memory assets with injectable failures
//! - RecordingOutput / RecordingSpeech: observable platform primitives
//! - MockConnector: channel-backed transports for session tests
//! - Harness: audio stack + phase machine wired to the above

#![allow(dead_code)]

pub mod fakes;
pub mod harness;
pub mod transport;

pub use fakes::{RecordingOutput, RecordingSpeech, RecordingUi, ScriptedLoader, UiCall};
pub use harness::Harness;
pub use transport::{MockConnector, ServerEnd};
