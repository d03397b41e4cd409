//! Recording fakes for the UI and audio primitives

use async_trait::async_trait;
use countgame_client::audio::{AssetLoader, AudioOutput, AudioResource, SpeechSynthesizer, Utterance};
use countgame_client::error::{PlaybackError, ResourceLoadError};
use countgame_client::events::{CameraInfo, GamePhase, GestureObservation};
use countgame_client::game::{UiAdapter, VideoStream};
use countgame_client::session::ConnectionState;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum UiCall {
    Phase(GamePhase),
    Connection(ConnectionState, String),
    Message(String),
    Cameras(Vec<CameraInfo>),
    StartVideo(String),
    StopVideo,
    Number(u32),
    Instruction(String),
    Gesture(Option<u32>),
    Progress(u32, u32),
    Celebration,
    Reset,
    Error(String),
}

#[derive(Default)]
pub struct RecordingUi {
    calls: Mutex<Vec<UiCall>>,
}

impl RecordingUi {
    pub fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn has(&self, call: &UiCall) -> bool {
        self.calls.lock().unwrap().contains(call)
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                UiCall::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: UiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl UiAdapter for RecordingUi {
    fn show_phase(&self, phase: GamePhase) {
        self.push(UiCall::Phase(phase));
    }

    fn show_connection(&self, state: ConnectionState, detail: &str) {
        self.push(UiCall::Connection(state, detail.to_string()));
    }

    fn show_message(&self, text: &str) {
        self.push(UiCall::Message(text.to_string()));
    }

    fn show_cameras(&self, cameras: &[CameraInfo]) {
        self.push(UiCall::Cameras(cameras.to_vec()));
    }

    fn start_video(&self, stream: &VideoStream) {
        self.push(UiCall::StartVideo(stream.url.clone()));
    }

    fn stop_video(&self) {
        self.push(UiCall::StopVideo);
    }

    fn show_number(&self, number: u32, _timeout: Duration) {
        self.push(UiCall::Number(number));
    }

    fn show_instruction(&self, text: &str) {
        self.push(UiCall::Instruction(text.to_string()));
    }

    fn show_gesture(&self, observation: Option<GestureObservation>) {
        self.push(UiCall::Gesture(observation.map(|o| o.number)));
    }

    fn show_progress(&self, completed: u32, total: u32) {
        self.push(UiCall::Progress(completed, total));
    }

    fn show_celebration(&self) {
        self.push(UiCall::Celebration);
    }

    fn reset_to_setup(&self) {
        self.push(UiCall::Reset);
    }

    fn show_error(&self, message: &str) {
        self.push(UiCall::Error(message.to_string()));
    }
}

/// Serves every catalog path from memory unless marked missing
pub struct ScriptedLoader {
    missing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    clip: Duration,
}

impl ScriptedLoader {
    pub fn new(missing: &[&str]) -> Self {
        Self {
            missing: Mutex::new(missing.iter().map(|p| p.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
            clip: Duration::from_millis(500),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_missing(&self, path: &str, missing: bool) {
        let mut set = self.missing.lock().unwrap();
        if missing {
            set.insert(path.to_string());
        } else {
            set.remove(path);
        }
    }
}

#[async_trait]
impl AssetLoader for ScriptedLoader {
    async fn load(&self, path: &str) -> Result<AudioResource, ResourceLoadError> {
        self.calls.lock().unwrap().push(path.to_string());
        if self.missing.lock().unwrap().contains(path) {
            return Err(ResourceLoadError::Fetch {
                path: path.to_string(),
                reason: "404 Not Found".to_string(),
            });
        }
        Ok(AudioResource::new(path, vec![0; 16]).with_duration(self.clip))
    }
}

/// Records resources as they start playing; optionally refuses output
/// until `resume` is called.
#[derive(Default)]
pub struct RecordingOutput {
    started: Mutex<Vec<(String, Instant)>>,
    refuse: AtomicBool,
}

impl RecordingOutput {
    pub fn played(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn start_times(&self) -> Vec<Instant> {
        self.started.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn refuse_until_resumed(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&self, resource: &AudioResource, _volume: f32) -> Result<(), PlaybackError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PlaybackError::NotAllowed("no user gesture yet".to_string()));
        }
        self.started
            .lock()
            .unwrap()
            .push((resource.key.clone(), Instant::now()));
        tokio::time::sleep(resource.duration.unwrap_or(Duration::from_millis(500))).await;
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        self.refuse.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSpeech {
    fn voices(&self) -> Vec<String> {
        vec!["Samantha".to_string()]
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), PlaybackError> {
        self.spoken.lock().unwrap().push(utterance.text.clone());
        tokio::time::sleep(Duration::from_millis(800)).await;
        Ok(())
    }

    fn cancel(&self) {}
}
