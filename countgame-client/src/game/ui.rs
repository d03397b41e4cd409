//! UI adapter seam
//!
//! The UI renders what the phase machine tells it and never drives game
//! logic itself. User input reaches the machine as [`UserAction`]s
//! (see `machine.rs`).
//!
//! [`UserAction`]: super::machine::UserAction

use crate::events::{CameraInfo, GamePhase, GestureObservation};
use crate::session::ConnectionState;
use std::time::Duration;
use tracing::{error, info};

/// Opaque handle to the server's video stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStream {
    pub url: String,
}

/// Rendering surface driven by the phase machine
pub trait UiAdapter: Send + Sync {
    fn show_phase(&self, phase: GamePhase);
    fn show_connection(&self, state: ConnectionState, detail: &str);
    /// Avatar speech bubble / status line
    fn show_message(&self, text: &str);
    fn show_cameras(&self, cameras: &[CameraInfo]);
    fn start_video(&self, stream: &VideoStream);
    fn stop_video(&self);
    fn show_number(&self, number: u32, timeout: Duration);
    fn show_instruction(&self, text: &str);
    /// `None` clears the gesture indicator
    fn show_gesture(&self, observation: Option<GestureObservation>);
    fn show_progress(&self, completed: u32, total: u32);
    fn show_celebration(&self);
    fn reset_to_setup(&self);
    /// Blocking, user-facing failure
    fn show_error(&self, message: &str);
}

/// Terminal "UI": renders every call as a log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl UiAdapter for TracingUi {
    fn show_phase(&self, phase: GamePhase) {
        info!(target: "ui", "Phase: {}", phase);
    }

    fn show_connection(&self, state: ConnectionState, detail: &str) {
        info!(target: "ui", "Connection {:?}: {}", state, detail);
    }

    fn show_message(&self, text: &str) {
        info!(target: "ui", "💬 {}", text);
    }

    fn show_cameras(&self, cameras: &[CameraInfo]) {
        if cameras.is_empty() {
            info!(target: "ui", "No cameras found");
        }
        for camera in cameras {
            info!(
                target: "ui",
                "📷 [{}] {} {}", camera.index, camera.name, camera.resolution
            );
        }
    }

    fn start_video(&self, stream: &VideoStream) {
        info!(target: "ui", "Video: {}", stream.url);
    }

    fn stop_video(&self) {
        info!(target: "ui", "Video stopped");
    }

    fn show_number(&self, number: u32, timeout: Duration) {
        info!(target: "ui", "Number {} ({}s)", number, timeout.as_secs());
    }

    fn show_instruction(&self, text: &str) {
        info!(target: "ui", "{}", text);
    }

    fn show_gesture(&self, observation: Option<GestureObservation>) {
        match observation {
            Some(o) => info!(
                target: "ui",
                "✋ {} ({:.0}%)", o.number, o.confidence * 100.0
            ),
            None => info!(target: "ui", "✋ -"),
        }
    }

    fn show_progress(&self, completed: u32, total: u32) {
        info!(target: "ui", "Progress {}/{}", completed, total);
    }

    fn show_celebration(&self) {
        info!(target: "ui", "🎉 You did it!");
    }

    fn reset_to_setup(&self) {
        info!(target: "ui", "Back to setup");
    }

    fn show_error(&self, message: &str) {
        error!(target: "ui", "{}", message);
    }
}
