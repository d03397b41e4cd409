//! Wire event types for the counting game protocol
//!
//! Every message is a named event with a JSON payload. On the wire the pair
//! is represented as `{"event": "<name>", "data": {...}}`, which maps onto
//! adjacently tagged enums so handlers match exhaustively instead of
//! dispatching on strings.

mod game_types;

pub use game_types::{CameraInfo, CameraState, GamePhase, GestureObservation};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Events pushed by the game server
///
/// Unknown payload fields are ignored so the server can add data without
/// breaking older clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Greeting/status text sent on connect
    ServerStatus {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },

    /// Cameras available for selection
    CameraList {
        #[serde(default)]
        cameras: Vec<CameraInfo>,
    },

    /// Camera start/stop/error outcome
    CameraStatus {
        status: CameraState,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        camera_index: Option<u32>,
    },

    /// Hand with `number` fingers seen by the detector
    GestureDetected { number: u32, confidence: f32 },

    /// Hand no longer visible
    GestureLost {},

    /// Server-side phase label changed (informational)
    GamePhaseChanged {
        #[serde(default)]
        phase: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        current_number: Option<u32>,
    },

    /// A new number is being asked for
    NumberStarted {
        number: u32,
        /// Advisory per-number timeout (the server also sends it as `timeout`)
        #[serde(alias = "timeout")]
        timeout_ms: u64,
    },

    /// The child showed the right number
    NumberSuccess {
        number: u32,
        #[serde(default)]
        completed: Vec<u32>,
    },

    /// The server moved on to the next number
    NextNumber {
        number: u32,
        #[serde(default)]
        progress: u32,
    },

    /// Play one cue
    PlayAudio { file: String },

    /// Play cues strictly in order
    PlayAudioSequence {
        #[serde(default)]
        sequence: Vec<String>,
    },

    /// Play one positive feedback cue chosen at random
    PlayRandomPositiveFeedback {},

    /// All numbers done
    GameCompleted {
        #[serde(default)]
        numbers_completed: Vec<u32>,
        #[serde(default)]
        completion_time: Option<f64>,
    },

    /// Game reset to the beginning
    GameRestarted {},
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ServerStatus { .. } => "server_status",
            ServerEvent::CameraList { .. } => "camera_list",
            ServerEvent::CameraStatus { .. } => "camera_status",
            ServerEvent::GestureDetected { .. } => "gesture_detected",
            ServerEvent::GestureLost {} => "gesture_lost",
            ServerEvent::GamePhaseChanged { .. } => "game_phase_changed",
            ServerEvent::NumberStarted { .. } => "number_started",
            ServerEvent::NumberSuccess { .. } => "number_success",
            ServerEvent::NextNumber { .. } => "next_number",
            ServerEvent::PlayAudio { .. } => "play_audio",
            ServerEvent::PlayAudioSequence { .. } => "play_audio_sequence",
            ServerEvent::PlayRandomPositiveFeedback {} => "play_random_positive_feedback",
            ServerEvent::GameCompleted { .. } => "game_completed",
            ServerEvent::GameRestarted {} => "game_restarted",
        }
    }

    /// Build an event from its name and raw JSON payload.
    ///
    /// An empty payload is treated as `{}`.
    pub fn from_parts(name: &str, data: &str) -> Result<Self> {
        let data: serde_json::Value = if data.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(data)?
        };
        let envelope = serde_json::json!({ "event": name, "data": data });
        serde_json::from_value(envelope)
            .map_err(|e| Error::Protocol(format!("event '{}': {}", name, e)))
    }
}

/// Events sent by the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Ask the server to enumerate cameras
    RequestCameraTest {},

    /// Start capture on the selected camera
    StartCamera { camera_index: u32 },

    /// Ask the server to restart the game
    RestartGame {},

    /// A cue finished playing (echoes the server identifier)
    AudioFinished { file: String },
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RequestCameraTest {} => "request_camera_test",
            ClientEvent::StartCamera { .. } => "start_camera",
            ClientEvent::RestartGame {} => "restart_game",
            ClientEvent::AudioFinished { .. } => "audio_finished",
        }
    }

    /// Serialize to the `{"event", "data"}` envelope
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
