//! Phase machine + audio stack wired to recording fakes

use super::fakes::{RecordingOutput, RecordingSpeech, RecordingUi, ScriptedLoader};
use countgame_client::app::AudioStack;
use countgame_client::events::{CameraState, ClientEvent, ServerEvent};
use countgame_client::game::PhaseStateMachine;
use countgame_client::session::SessionHandle;
use countgame_client::ClientConfig;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct Harness {
    pub ui: Arc<RecordingUi>,
    pub loader: Arc<ScriptedLoader>,
    pub output: Arc<RecordingOutput>,
    pub speech: Arc<RecordingSpeech>,
    pub audio: AudioStack,
    pub machine: PhaseStateMachine,
    outbound: Option<mpsc::UnboundedReceiver<ClientEvent>>,
}

impl Harness {
    /// Default configuration, every asset available, detached session
    pub async fn new() -> Self {
        Self::with_missing(&[]).await
    }

    pub async fn with_missing(missing: &[&str]) -> Self {
        let (handle, outbound) = SessionHandle::detached();
        let mut harness = Self::build(ClientConfig::default(), missing, handle).await;
        harness.outbound = Some(outbound);
        harness
    }

    /// Machine sending through an existing session handle
    pub async fn build(config: ClientConfig, missing: &[&str], handle: SessionHandle) -> Self {
        let ui = Arc::new(RecordingUi::default());
        let loader = Arc::new(ScriptedLoader::new(missing));
        let output = Arc::new(RecordingOutput::default());
        let speech = Arc::new(RecordingSpeech::default());

        let audio = AudioStack::build(&config, loader.clone(), output.clone(), speech.clone())
            .await
            .expect("default configuration builds");
        let machine = audio.machine(&config, ui.clone(), handle);

        Self {
            ui,
            loader,
            output,
            speech,
            audio,
            machine,
            outbound: None,
        }
    }

    pub fn feed(&mut self, events: Vec<ServerEvent>) {
        for event in events {
            self.machine.handle_server_event(event);
        }
    }

    /// setup → waiting_for_start → counting_game on number 1
    pub fn start_counting(&mut self) {
        self.feed(vec![camera_started(), number_started(1)]);
    }

    /// Outbound events sent since the last call
    pub fn sent(&mut self) -> Vec<ClientEvent> {
        let mut sent = Vec::new();
        if let Some(rx) = self.outbound.as_mut() {
            while let Ok(event) = rx.try_recv() {
                sent.push(event);
            }
        }
        sent
    }

    /// Identifiers reported via `audio_finished`, draining outbound
    pub fn finished_cues(&mut self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::AudioFinished { file } => Some(file),
                _ => None,
            })
            .collect()
    }
}

pub fn camera_started() -> ServerEvent {
    ServerEvent::CameraStatus {
        status: CameraState::Started,
        message: None,
        camera_index: Some(0),
    }
}

pub fn number_started(number: u32) -> ServerEvent {
    ServerEvent::NumberStarted {
        number,
        timeout_ms: 5000,
    }
}

pub fn play(file: &str) -> ServerEvent {
    ServerEvent::PlayAudio {
        file: file.to_string(),
    }
}

pub fn sequence(files: &[&str]) -> ServerEvent {
    ServerEvent::PlayAudioSequence {
        sequence: files.iter().map(|f| f.to_string()).collect(),
    }
}
