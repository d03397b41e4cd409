//! Headless output primitives
//!
//! Stand-ins for a real device: playback and speech take as long as they
//! would on a speaker and are reported through tracing.

use super::loader::AudioResource;
use super::playback::{AudioOutput, SpeechSynthesizer, Utterance};
use crate::error::PlaybackError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Used when a container does not report its length
const UNKNOWN_DURATION: Duration = Duration::from_millis(1000);

/// Speaking time per word at rate 1.0
const WORD_DURATION: Duration = Duration::from_millis(400);

#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessOutput;

#[async_trait]
impl AudioOutput for HeadlessOutput {
    async fn play(&self, resource: &AudioResource, volume: f32) -> Result<(), PlaybackError> {
        let length = resource.duration.unwrap_or(UNKNOWN_DURATION);
        debug!("▶ {} (volume {:.2}, {:?})", resource.key, volume, length);
        tokio::time::sleep(length).await;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct HeadlessSpeech {
    voices: Vec<String>,
}

impl HeadlessSpeech {
    pub fn with_voices(voices: Vec<String>) -> Self {
        Self { voices }
    }

    /// Estimated speaking time for an utterance
    pub fn estimate(utterance: &Utterance) -> Duration {
        let words = utterance.text.split_whitespace().count().max(1) as u32;
        let rate = if utterance.rate > 0.0 { utterance.rate } else { 1.0 };
        (WORD_DURATION * words).div_f64(rate as f64)
    }
}

#[async_trait]
impl SpeechSynthesizer for HeadlessSpeech {
    fn voices(&self) -> Vec<String> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), PlaybackError> {
        debug!(
            "🗣 \"{}\" (rate {:.1}, pitch {:.1}, volume {:.2}, voice {})",
            utterance.text,
            utterance.rate,
            utterance.pitch,
            utterance.volume,
            utterance.voice.as_deref().unwrap_or("default")
        );
        tokio::time::sleep(Self::estimate(utterance)).await;
        Ok(())
    }

    fn cancel(&self) {
        debug!("Speech cancelled");
    }
}
