//! Game logic
//!
//! - `machine`: phase state machine driven by session input and user actions
//! - `scheduler`: generation-scoped, cancellable task spawning
//! - `sequencer`: ordered cue playback with `audio_finished` reporting
//! - `ui`: rendering seam
//! - `diagnostics`: unexpected-event accounting

pub mod diagnostics;
pub mod machine;
pub mod scheduler;
pub mod sequencer;
pub mod ui;

pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use machine::{ActiveNumberContext, Disposition, PhaseStateMachine, SessionSnapshot, UserAction};
pub use scheduler::{EpochGuard, ScheduledTask, TaskScheduler};
pub use sequencer::CueSequencer;
pub use ui::{TracingUi, UiAdapter, VideoStream};
