//! Playback controller
//!
//! Owns volume policy, mute, the single active utterance and the deferred
//! slot for output refused by the platform. Recorded audio and speech go
//! through the [`AudioOutput`] and [`SpeechSynthesizer`] primitives.

use super::loader::AudioResource;
use crate::error::PlaybackError;
use crate::events::{AudioEvent, EventBus};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fully resolved utterance handed to the synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    /// Effective volume (speech × master)
    pub volume: f32,
    pub voice: Option<String>,
}

/// Per-phrase overrides of the speech defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechOptions {
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    /// Overrides the speech volume channel (still scaled by master)
    pub volume: Option<f32>,
    pub voice: Option<String>,
}

/// Speech defaults applied when a phrase carries no override
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechDefaults {
    pub rate: f32,
    pub pitch: f32,
    pub voice: Option<String>,
}

impl Default for SpeechDefaults {
    fn default() -> Self {
        Self {
            rate: 0.7,
            pitch: 1.2,
            voice: None,
        }
    }
}

/// Platform audio output
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play `resource` at `volume` and resolve when it ends.
    ///
    /// Dropping the future stops playback.
    async fn play(&self, resource: &AudioResource, volume: f32) -> Result<(), PlaybackError>;

    /// Called on a user gesture before deferred output is replayed
    async fn resume(&self) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// Platform speech synthesizer
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Voice names available on this platform
    fn voices(&self) -> Vec<String> {
        Vec::new()
    }

    /// Speak and resolve when the utterance ends
    async fn speak(&self, utterance: &Utterance) -> Result<(), PlaybackError>;

    /// Stop whatever is being spoken
    fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Completed,
    /// Muted: nothing reached the output
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    Completed,
    /// Superseded by a newer utterance or stopped by mute
    Cancelled,
    Muted,
}

#[derive(Debug, Clone, Copy)]
struct Volumes {
    master: f32,
    effects: f32,
    speech: f32,
}

/// Owner of a deferred resource: the generation it was requested in and,
/// for server cues, the identifier to report once it finally plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredScope {
    pub epoch: u64,
    pub cue: Option<String>,
}

impl DeferredScope {
    /// Server cue that must be reported when replayed
    pub fn cue(cue: impl Into<String>, epoch: u64) -> Self {
        Self {
            epoch,
            cue: Some(cue.into()),
        }
    }

    /// Phase-bound output that is never reported
    pub fn unreported(epoch: u64) -> Self {
        Self { epoch, cue: None }
    }
}

/// Deferred output that was replayed on a user gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed {
    pub outcome: PlayOutcome,
    pub scope: Option<DeferredScope>,
}

struct DeferredPlay {
    resource: Arc<AudioResource>,
    scope: Option<DeferredScope>,
}

struct ActiveUtterance {
    id: u64,
    cancel: CancellationToken,
}

/// Pick the first preferred voice the platform offers, else its first voice
pub fn select_voice(preferred: &[String], available: &[String]) -> Option<String> {
    preferred
        .iter()
        .find(|p| available.iter().any(|a| a == *p))
        .or_else(|| available.first())
        .cloned()
}

pub struct PlaybackController {
    output: Arc<dyn AudioOutput>,
    speech: Arc<dyn SpeechSynthesizer>,
    bus: EventBus,
    defaults: SpeechDefaults,
    volumes: RwLock<Volumes>,
    muted: AtomicBool,
    active_utterance: Mutex<Option<ActiveUtterance>>,
    next_utterance_id: AtomicU64,
    deferred: Mutex<Option<DeferredPlay>>,
}

impl PlaybackController {
    pub fn new(
        output: Arc<dyn AudioOutput>,
        speech: Arc<dyn SpeechSynthesizer>,
        bus: EventBus,
        defaults: SpeechDefaults,
    ) -> Self {
        Self {
            output,
            speech,
            bus,
            defaults,
            volumes: RwLock::new(Volumes {
                master: 0.7,
                effects: 0.6,
                speech: 0.8,
            }),
            muted: AtomicBool::new(false),
            active_utterance: Mutex::new(None),
            next_utterance_id: AtomicU64::new(1),
            deferred: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn speech_defaults(&self) -> &SpeechDefaults {
        &self.defaults
    }

    /// Play a recorded resource once at effects × master volume.
    ///
    /// Muted: returns immediately without touching the output. Refused by
    /// the platform: the resource is parked for
    /// [`resume_after_user_gesture`](Self::resume_after_user_gesture) and
    /// `NotAllowed` is returned.
    pub async fn play(&self, resource: &Arc<AudioResource>) -> Result<PlayOutcome, PlaybackError> {
        self.play_scoped(resource, None).await
    }

    /// [`play`](Self::play), parking a refused resource under `scope`. A
    /// newer refusal replaces an older one.
    pub async fn play_scoped(
        &self,
        resource: &Arc<AudioResource>,
        scope: Option<DeferredScope>,
    ) -> Result<PlayOutcome, PlaybackError> {
        if self.is_muted() {
            debug!("Muted, skipping {}", resource.key);
            return Ok(PlayOutcome::Muted);
        }

        let volume = {
            let v = self.volumes.read().await;
            v.effects * v.master
        };

        match self.output.play(resource, volume).await {
            Ok(()) => {
                self.bus.emit_lossy(AudioEvent::PlaybackFinished {
                    resource: resource.key.clone(),
                });
                Ok(PlayOutcome::Completed)
            }
            Err(PlaybackError::NotAllowed(reason)) => {
                info!("Playback of {} deferred until user gesture: {}", resource.key, reason);
                let mut deferred = self.deferred.lock().await;
                if let Some(previous) = deferred.as_ref() {
                    debug!("Deferred {} replaced by {}", previous.resource.key, resource.key);
                }
                *deferred = Some(DeferredPlay {
                    resource: Arc::clone(resource),
                    scope,
                });
                Err(PlaybackError::NotAllowed(reason))
            }
            Err(e) => {
                warn!("Playback of {} failed: {}", resource.key, e);
                Err(e)
            }
        }
    }

    /// Speak `text`, cancelling any utterance still in progress.
    pub async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<SpeakOutcome, PlaybackError> {
        if self.is_muted() {
            debug!("Muted, not speaking '{}'", text);
            return Ok(SpeakOutcome::Muted);
        }

        let utterance = {
            let v = self.volumes.read().await;
            Utterance {
                text: text.to_string(),
                rate: options.rate.unwrap_or(self.defaults.rate),
                pitch: options.pitch.unwrap_or(self.defaults.pitch),
                volume: options.volume.unwrap_or(v.speech).clamp(0.0, 1.0) * v.master,
                voice: options.voice.clone().or_else(|| self.defaults.voice.clone()),
            }
        };

        let id = self.next_utterance_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        {
            let mut active = self.active_utterance.lock().await;
            if let Some(previous) = active.take() {
                debug!("Cancelling utterance {} for '{}'", previous.id, text);
                previous.cancel.cancel();
                self.speech.cancel();
            }
            *active = Some(ActiveUtterance {
                id,
                cancel: token.clone(),
            });
        }

        let result = tokio::select! {
            spoken = self.speech.speak(&utterance) => spoken.map(|_| SpeakOutcome::Completed),
            _ = token.cancelled() => Ok(SpeakOutcome::Cancelled),
        };

        {
            let mut active = self.active_utterance.lock().await;
            if active.as_ref().map(|a| a.id) == Some(id) {
                *active = None;
            }
        }

        if let Ok(SpeakOutcome::Completed) = result {
            self.bus.emit_lossy(AudioEvent::SpeechFinished {
                text: utterance.text,
            });
        }
        result
    }

    /// Cancel the active utterance, if any
    pub async fn stop_speech(&self) {
        if let Some(active) = self.active_utterance.lock().await.take() {
            active.cancel.cancel();
            self.speech.cancel();
        }
    }

    pub async fn is_speaking(&self) -> bool {
        self.active_utterance.lock().await.is_some()
    }

    pub async fn set_master_volume(&self, volume: f32) {
        self.volumes.write().await.master = volume.clamp(0.0, 1.0);
    }

    pub async fn set_effects_volume(&self, volume: f32) {
        self.volumes.write().await.effects = volume.clamp(0.0, 1.0);
    }

    pub async fn set_speech_volume(&self, volume: f32) {
        self.volumes.write().await.speech = volume.clamp(0.0, 1.0);
    }

    pub async fn master_volume(&self) -> f32 {
        self.volumes.read().await.master
    }

    pub async fn effects_volume(&self) -> f32 {
        self.volumes.read().await.effects
    }

    pub async fn speech_volume(&self) -> f32 {
        self.volumes.read().await.speech
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub async fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        if muted {
            self.stop_speech().await;
        }
        info!("Audio {}", if muted { "muted" } else { "unmuted" });
    }

    /// Flip mute and return the new state
    pub async fn toggle_mute(&self) -> bool {
        let muted = !self.muted.fetch_xor(true, Ordering::SeqCst);
        if muted {
            self.stop_speech().await;
        }
        info!("Audio {}", if muted { "muted" } else { "unmuted" });
        muted
    }

    pub async fn has_deferred(&self) -> bool {
        self.deferred.lock().await.is_some()
    }

    /// Drop whatever is parked
    pub async fn clear_deferred(&self) {
        if let Some(parked) = self.deferred.lock().await.take() {
            debug!("Discarding deferred {}", parked.resource.key);
        }
    }

    /// Unlock the output and replay the most recently deferred resource.
    ///
    /// A resource parked under a generation other than `epoch` belongs to
    /// abandoned work and is discarded instead of played.
    pub async fn resume_after_user_gesture(&self, epoch: u64) -> Result<Option<Replayed>, PlaybackError> {
        self.output.resume().await?;
        let Some(parked) = self.deferred.lock().await.take() else {
            return Ok(None);
        };
        if let Some(scope) = &parked.scope {
            if scope.epoch != epoch {
                debug!(
                    "Discarding deferred {} from generation {} (now {})",
                    parked.resource.key, scope.epoch, epoch
                );
                return Ok(None);
            }
        }

        info!("Replaying deferred {}", parked.resource.key);
        let outcome = self.play_scoped(&parked.resource, parked.scope.clone()).await?;
        Ok(Some(Replayed {
            outcome,
            scope: parked.scope,
        }))
    }
}
