//! Component wiring
//!
//! Builds the audio stack and the phase machine from configuration. The
//! binary uses the headless primitives; tests inject their own loader,
//! output, speech, UI and transport.

use crate::audio::playback::select_voice;
use crate::audio::{
    AssetId, AssetLoader, AudioAssetCache, AudioCatalog, AudioOutput, CuePlayer, CueTable,
    FileAssetLoader, HttpAssetLoader, PlaybackController, SpeechDefaults, SpeechSynthesizer,
};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::game::{CueSequencer, Diagnostics, PhaseStateMachine, UiAdapter, VideoStream};
use crate::session::SessionHandle;
use std::sync::Arc;
use tracing::{info, warn};

/// Catalog, cache, controller and cue player sharing one configuration
pub struct AudioStack {
    pub catalog: Arc<AudioCatalog>,
    pub cache: Arc<AudioAssetCache>,
    pub controller: Arc<PlaybackController>,
    pub player: Arc<CuePlayer>,
}

impl AudioStack {
    pub async fn build(
        config: &ClientConfig,
        loader: Arc<dyn AssetLoader>,
        output: Arc<dyn AudioOutput>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self> {
        let catalog = Arc::new(AudioCatalog::from_config(&config.catalog)?);
        let table = Arc::new(CueTable::build(
            Arc::clone(&catalog),
            config.game.max_number,
            config.audio.fallback,
        )?);
        info!(
            "Audio catalog: {} assets, {} cues",
            catalog.len(),
            table.len()
        );

        let voice = select_voice(&config.speech.preferred_voices, &speech.voices());
        if let Some(voice) = &voice {
            info!("Using voice {}", voice);
        }
        let defaults = SpeechDefaults {
            rate: config.speech.rate,
            pitch: config.speech.pitch,
            voice,
        };

        let controller = Arc::new(PlaybackController::new(
            output,
            speech,
            EventBus::default(),
            defaults,
        ));
        controller.set_master_volume(config.audio.master_volume).await;
        controller.set_effects_volume(config.audio.effects_volume).await;
        controller.set_speech_volume(config.audio.speech_volume).await;

        let cache = Arc::new(AudioAssetCache::new(Arc::clone(&catalog), loader));
        let player = Arc::new(CuePlayer::new(
            Arc::clone(&cache),
            Arc::clone(&controller),
            table,
        ));

        Ok(Self {
            catalog,
            cache,
            controller,
            player,
        })
    }

    /// Parse the configured preload list; unparseable ids are skipped
    pub fn preload_ids(config: &ClientConfig) -> Vec<AssetId> {
        config
            .audio
            .preload
            .iter()
            .filter_map(|raw| match raw.parse::<AssetId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Skipping preload entry: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Phase machine wired to this stack
    pub fn machine(
        &self,
        config: &ClientConfig,
        ui: Arc<dyn UiAdapter>,
        outbound: SessionHandle,
    ) -> PhaseStateMachine {
        let diagnostics = Diagnostics::new();
        let sequencer = Arc::new(CueSequencer::new(
            Arc::clone(&self.player),
            outbound.clone(),
            config.audio.inter_cue_pause(),
            diagnostics.unknown_cue_counter(),
        ));
        PhaseStateMachine::new(
            ui,
            sequencer,
            outbound,
            VideoStream {
                url: config.video_url(),
            },
            config.game.max_number,
            diagnostics,
        )
    }
}

/// HTTP loader for remote asset roots, file loader otherwise
pub fn asset_loader(config: &ClientConfig, client: reqwest::Client) -> Arc<dyn AssetLoader> {
    match config.audio_base_url() {
        Some(url) => {
            info!("Loading audio from {}", url);
            Arc::new(HttpAssetLoader::new(client, url))
        }
        None => {
            info!("Loading audio from {}", config.audio.base_path);
            Arc::new(FileAssetLoader::from_base_path(&config.audio.base_path))
        }
    }
}
