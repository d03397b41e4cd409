//! Game-related type definitions
//!
//! Supporting types carried inside wire events and shared with the client
//! state machine.

use serde::{Deserialize, Serialize};

/// Coarse game phase controlling which server events are meaningful
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Nothing selected yet (initial phase)
    #[default]
    Setup,
    /// Camera enumeration requested, waiting for the user to pick one
    CameraTest,
    /// Camera running, server greeting the child
    WaitingForStart,
    /// Numbers are being asked for
    CountingGame,
    /// All numbers done, celebration showing
    Completed,
}

impl GamePhase {
    /// Wire/debug name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Setup => "setup",
            GamePhase::CameraTest => "camera_test",
            GamePhase::WaitingForStart => "waiting_for_start",
            GamePhase::CountingGame => "counting_game",
            GamePhase::Completed => "completed",
        }
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One camera offered by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CameraInfo {
    /// Device index used in `start_camera`
    pub index: u32,
    /// Human readable device name
    pub name: String,
    /// Resolution as reported by the server (e.g. "640x480")
    #[serde(default)]
    pub resolution: String,
}

/// Camera status reported in `camera_status`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    /// Capture started; the video stream is available
    Started,
    /// Capture failed to start
    Error,
    /// Capture stopped by the server
    Stopped,
}

/// Transient gesture reading; never retained past the UI refresh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureObservation {
    /// Number of fingers detected
    pub number: u32,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
}
