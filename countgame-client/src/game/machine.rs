//! Game phase state machine
//!
//! Consumes the ordered session input stream and local user actions,
//! advances the [`GamePhase`], drives the UI and starts audio work.
//!
//! Each event's synchronous effects (phase, context, UI, outbound events)
//! are applied in arrival order. Audio work runs as scheduler tasks that
//! hold an [`EpochGuard`](super::scheduler::EpochGuard); every phase entry
//! advances the generation so work started for an abandoned phase is
//! discarded on resume.

use super::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use super::scheduler::{ScheduledTask, TaskScheduler};
use super::sequencer::CueSequencer;
use super::ui::{UiAdapter, VideoStream};
use crate::audio::cues::show_number_text;
use crate::audio::PlaybackController;
use crate::events::{CameraInfo, CameraState, ClientEvent, GamePhase, GestureObservation, ServerEvent};
use crate::session::{ConnectionSignal, ConnectionState, SessionHandle, SessionInput};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Shown when the connector gives up
pub const FATAL_CONNECTION_MESSAGE: &str =
    "Unable to connect to the game server. Please refresh the page and try again.";

/// Number currently being asked for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveNumberContext {
    pub number: u32,
    /// Advisory only; expiry is decided by the server
    pub timeout_ms: u64,
    pub started_at: DateTime<Utc>,
}

/// Input originating from the local user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    RequestCameraTest,
    SelectCamera(u32),
    Restart,
    /// Any click/tap; unlocks deferred audio
    Gesture,
    ToggleMute,
}

/// How an input was treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handled by the current phase
    Applied,
    /// Accepted in any phase without changing it
    Informational,
    /// Not meaningful now; counted and dropped
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: GamePhase,
    pub connection: ConnectionState,
    pub active_number: Option<ActiveNumberContext>,
    pub generation: u64,
    pub completed_numbers: Vec<u32>,
    pub cameras: usize,
    pub muted: bool,
    pub diagnostics: DiagnosticsSnapshot,
}

pub struct PhaseStateMachine {
    phase: GamePhase,
    active: Option<ActiveNumberContext>,
    connection: ConnectionState,
    cameras: Vec<CameraInfo>,
    completed: Vec<u32>,
    max_number: u32,
    video: VideoStream,
    ui: Arc<dyn UiAdapter>,
    sequencer: Arc<CueSequencer>,
    controller: Arc<PlaybackController>,
    outbound: SessionHandle,
    scheduler: TaskScheduler,
    tasks: Vec<ScheduledTask>,
    number_timer: Option<ScheduledTask>,
    diagnostics: Diagnostics,
}

impl PhaseStateMachine {
    pub fn new(
        ui: Arc<dyn UiAdapter>,
        sequencer: Arc<CueSequencer>,
        outbound: SessionHandle,
        video: VideoStream,
        max_number: u32,
        diagnostics: Diagnostics,
    ) -> Self {
        let controller = Arc::clone(sequencer.player().controller());
        Self {
            phase: GamePhase::Setup,
            active: None,
            connection: ConnectionState::Disconnected,
            cameras: Vec::new(),
            completed: Vec::new(),
            max_number,
            video,
            ui,
            sequencer,
            controller,
            outbound,
            scheduler: TaskScheduler::new(),
            tasks: Vec::new(),
            number_timer: None,
            diagnostics,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn active_number(&self) -> Option<&ActiveNumberContext> {
        self.active.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.scheduler.generation()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            connection: self.connection,
            active_number: self.active.clone(),
            generation: self.generation(),
            completed_numbers: self.completed.clone(),
            cameras: self.cameras.len(),
            muted: self.controller.is_muted(),
            diagnostics: self.diagnostics.snapshot(),
        }
    }

    /// Process session input until the session ends. User actions are
    /// interleaved as they arrive.
    pub async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<SessionInput>,
        mut actions: mpsc::UnboundedReceiver<UserAction>,
    ) -> SessionSnapshot {
        let mut actions_open = true;
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => {
                        self.handle_input(input);
                    }
                    None => break,
                },
                action = actions.recv(), if actions_open => match action {
                    Some(action) => {
                        self.handle_user_action(action).await;
                    }
                    None => actions_open = false,
                },
            }
        }

        info!("Session ended in phase {}", self.phase);
        self.shutdown();
        self.snapshot()
    }

    pub fn handle_input(&mut self, input: SessionInput) -> Disposition {
        match input {
            SessionInput::Connection(signal) => self.handle_connection(signal),
            SessionInput::Server(event) => self.handle_server_event(event),
        }
    }

    pub fn handle_connection(&mut self, signal: ConnectionSignal) -> Disposition {
        match signal {
            ConnectionSignal::Connected => {
                self.connection = ConnectionState::Connected;
                self.ui.show_connection(self.connection, "Connected to game server");
            }
            ConnectionSignal::Disconnected { reason } => {
                self.connection = ConnectionState::Disconnected;
                debug!("Disconnected: {}", reason);
                self.ui.show_connection(self.connection, "Disconnected from server");
            }
            ConnectionSignal::Retrying { attempt, delay, .. } => {
                self.connection = ConnectionState::Connecting;
                self.ui.show_connection(
                    self.connection,
                    &format!(
                        "Connection failed, retrying in {}s (attempt {})",
                        delay.as_secs(),
                        attempt
                    ),
                );
            }
            ConnectionSignal::Fatal { .. } => {
                self.connection = ConnectionState::Error;
                self.ui.show_connection(self.connection, "Connection failed");
                self.ui.show_error(FATAL_CONNECTION_MESSAGE);
            }
        }
        Disposition::Informational
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) -> Disposition {
        use GamePhase::*;

        let name = event.name();
        debug!(phase = %self.phase, "Handling {}", name);

        match (self.phase, event) {
            (_, ServerEvent::ServerStatus { message, .. }) => {
                self.ui
                    .show_message(message.as_deref().unwrap_or("Server is ready!"));
                Disposition::Informational
            }
            (_, ServerEvent::GamePhaseChanged { phase, message, .. }) => {
                debug!("Server phase label: {:?}", phase);
                if let Some(message) = message {
                    self.ui.show_message(&message);
                }
                Disposition::Informational
            }
            (_, ServerEvent::CameraStatus { status: CameraState::Error, message, .. }) => {
                self.ui.show_error(&format!(
                    "Camera error: {}",
                    message.as_deref().unwrap_or("unknown error")
                ));
                Disposition::Informational
            }
            (_, ServerEvent::CameraStatus { status: CameraState::Stopped, .. }) => {
                self.ui.stop_video();
                Disposition::Informational
            }
            (_, ServerEvent::GameRestarted {}) => {
                self.restart_locally();
                Disposition::Applied
            }

            (CameraTest, ServerEvent::CameraList { cameras }) => {
                self.ui.show_cameras(&cameras);
                self.ui.show_message(if cameras.is_empty() {
                    "No cameras found. Please check your camera connection."
                } else {
                    "Select your camera to continue"
                });
                self.cameras = cameras;
                Disposition::Applied
            }
            (Setup | CameraTest, ServerEvent::CameraStatus { status: CameraState::Started, .. }) => {
                self.ui.start_video(&self.video);
                self.ui.show_message("Camera started! Get ready to play!");
                self.enter_phase(WaitingForStart);
                Disposition::Applied
            }

            (WaitingForStart | CountingGame, ServerEvent::GestureDetected { number, confidence }) => {
                self.ui
                    .show_gesture(Some(GestureObservation { number, confidence }));
                Disposition::Applied
            }
            (WaitingForStart | CountingGame, ServerEvent::GestureLost {}) => {
                self.ui.show_gesture(None);
                Disposition::Applied
            }

            (WaitingForStart, ServerEvent::NumberStarted { number, timeout_ms }) => {
                self.enter_phase(CountingGame);
                self.start_number(number, timeout_ms);
                Disposition::Applied
            }
            (CountingGame, ServerEvent::NumberStarted { number, timeout_ms }) => {
                self.start_number(number, timeout_ms);
                Disposition::Applied
            }
            (CountingGame, ServerEvent::NumberSuccess { number, completed }) => {
                debug!("Number {} done", number);
                self.completed = completed;
                self.ui
                    .show_progress(self.completed.len() as u32, self.max_number);
                Disposition::Applied
            }
            (CountingGame, ServerEvent::NextNumber { number, progress }) => {
                debug!("Next number {}", number);
                self.ui.show_progress(progress, self.max_number);
                Disposition::Applied
            }

            (WaitingForStart | CountingGame, ServerEvent::PlayAudio { file }) => {
                self.spawn_sequence("play_audio", vec![file]);
                Disposition::Applied
            }
            (WaitingForStart | CountingGame, ServerEvent::PlayAudioSequence { sequence }) => {
                self.spawn_sequence("play_audio_sequence", sequence);
                Disposition::Applied
            }
            (WaitingForStart | CountingGame, ServerEvent::PlayRandomPositiveFeedback {}) => {
                let sequencer = Arc::clone(&self.sequencer);
                let task = self
                    .scheduler
                    .spawn("positive_feedback", move |guard| async move {
                        sequencer.play_positive_feedback(&guard).await;
                    });
                self.track(task);
                Disposition::Applied
            }

            (CountingGame, ServerEvent::GameCompleted { numbers_completed, .. }) => {
                if !numbers_completed.is_empty() {
                    self.completed = numbers_completed;
                }
                self.ui.show_celebration();
                self.ui.show_instruction(&format!(
                    "Congratulations! You counted to {}!",
                    self.max_number
                ));
                self.enter_phase(Completed);
                Disposition::Applied
            }

            (phase, _) => {
                self.diagnostics.record_unexpected(phase, name);
                Disposition::Ignored
            }
        }
    }

    /// Apply a local user action. Every action also counts as a user
    /// gesture for deferred audio.
    pub async fn handle_user_action(&mut self, action: UserAction) -> Disposition {
        let disposition = self.apply_user_action(action).await;
        self.resume_deferred_audio();
        disposition
    }

    async fn apply_user_action(&mut self, action: UserAction) -> Disposition {
        match action {
            UserAction::RequestCameraTest => match self.phase {
                GamePhase::Setup | GamePhase::CameraTest => {
                    self.send(ClientEvent::RequestCameraTest {});
                    if self.phase == GamePhase::Setup {
                        self.enter_phase(GamePhase::CameraTest);
                    }
                    self.ui.show_message("Looking for cameras...");
                    Disposition::Applied
                }
                _ => {
                    debug!("Camera test not available in phase {}", self.phase);
                    Disposition::Ignored
                }
            },
            UserAction::SelectCamera(index) => match self.phase {
                GamePhase::Setup | GamePhase::CameraTest => {
                    self.send(ClientEvent::StartCamera {
                        camera_index: index,
                    });
                    self.ui.show_message("Starting camera...");
                    Disposition::Applied
                }
                _ => {
                    debug!("Camera selection not available in phase {}", self.phase);
                    Disposition::Ignored
                }
            },
            UserAction::Restart => {
                self.send(ClientEvent::RestartGame {});
                Disposition::Applied
            }
            UserAction::Gesture => Disposition::Applied,
            UserAction::ToggleMute => {
                let muted = self.controller.toggle_mute().await;
                self.ui
                    .show_message(if muted { "Sound off" } else { "Sound on" });
                Disposition::Applied
            }
        }
    }

    /// Wait for all in-flight audio work to finish
    pub async fn settle(&mut self) {
        for task in self.tasks.drain(..) {
            task.join().await;
        }
    }

    /// Cancel all scheduled work
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.cancel_tasks();
    }

    fn enter_phase(&mut self, next: GamePhase) {
        let previous = self.phase;
        let generation = self.scheduler.advance();
        self.cancel_tasks();
        self.phase = next;
        info!(from = %previous, to = %next, generation, "Phase change");
        self.ui.show_phase(next);
    }

    fn restart_locally(&mut self) {
        self.active = None;
        self.completed.clear();
        self.cameras.clear();
        self.ui.stop_video();
        self.ui.reset_to_setup();
        self.ui.show_message("Game restarted! Let's set up your camera again.");
        self.enter_phase(GamePhase::Setup);
    }

    fn start_number(&mut self, number: u32, timeout_ms: u64) {
        if let Some(timer) = self.number_timer.take() {
            timer.cancel();
        }

        self.active = Some(ActiveNumberContext {
            number,
            timeout_ms,
            started_at: Utc::now(),
        });

        let timeout = Duration::from_millis(timeout_ms);
        self.ui.show_number(number, timeout);
        self.ui.show_instruction(&show_number_text(number));

        self.number_timer = Some(self.scheduler.schedule_after(
            "number_timeout",
            timeout,
            move |_| async move {
                debug!("Advisory timeout for number {} elapsed", number);
            },
        ));
    }

    fn spawn_sequence(&mut self, name: &'static str, cues: Vec<String>) {
        let sequencer = Arc::clone(&self.sequencer);
        let task = self.scheduler.spawn(name, move |guard| async move {
            sequencer.play_sequence(&cues, &guard).await;
        });
        self.track(task);
    }

    /// Replay audio the output refused before this gesture. Only audio
    /// parked in the current generation is replayed; a replayed sequence
    /// cue is reported like any other finished cue.
    fn resume_deferred_audio(&mut self) {
        let controller = Arc::clone(&self.controller);
        let outbound = self.outbound.clone();
        let task = self.scheduler.spawn("resume_audio", move |guard| async move {
            let replayed = match guard
                .run(controller.resume_after_user_gesture(guard.epoch()))
                .await
            {
                Some(Ok(Some(replayed))) => replayed,
                Some(Err(e)) => {
                    warn!("Deferred audio still blocked: {}", e);
                    return;
                }
                _ => return,
            };
            debug!("Deferred audio replayed: {:?}", replayed.outcome);

            let Some(cue) = replayed.scope.and_then(|scope| scope.cue) else {
                return;
            };
            if !guard.is_current() {
                return;
            }
            if let Err(e) = outbound.send(ClientEvent::AudioFinished { file: cue.clone() }) {
                warn!("Could not report {} finished: {}", cue, e);
            }
        });
        self.track(task);
    }

    fn track(&mut self, task: ScheduledTask) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }

    fn cancel_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.cancel();
        }
        if let Some(timer) = self.number_timer.take() {
            timer.cancel();
        }
    }

    fn send(&self, event: ClientEvent) {
        if let Err(e) = self.outbound.send(event) {
            warn!("Outbound event dropped: {}", e);
        }
    }
}
