//! Server cue lookup and playback
//!
//! The server refers to audio by cue identifiers (`number_3`,
//! `hi_ready_to_play`). [`CueTable`] maps each identifier onto a catalog
//! asset plus a scripted phrase to speak when the asset cannot be played.
//! [`CuePlayer`] applies the fallback policy of the cue's category.

use super::cache::AudioAssetCache;
use super::catalog::{AssetCategory, AssetId, AudioCatalog};
use super::playback::{DeferredScope, PlayOutcome, PlaybackController, SpeakOutcome, SpeechOptions};
use crate::config::FallbackConfig;
use crate::error::{Error, PlaybackError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do when a cue's asset cannot be loaded or played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Speak the scripted phrase instead
    #[default]
    BestEffort,
    /// Surface the failure to the caller
    Strict,
}

/// Cue identifiers every deployment must be able to serve
pub const REQUIRED_CUES: &[&str] = &[
    "hi_ready_to_play",
    "show_me_your_fingers",
    "lets_start_counting",
    "try_again",
];

const NUMBER_CUE_PREFIX: &str = "number_";

/// Text to speak plus overrides
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    pub text: String,
    pub options: SpeechOptions,
}

impl Phrase {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: SpeechOptions::default(),
        }
    }

    fn tuned(text: &str, pitch: Option<f32>, rate: Option<f32>) -> Self {
        Self {
            text: text.to_string(),
            options: SpeechOptions {
                pitch,
                rate,
                ..Default::default()
            },
        }
    }
}

/// English word for 1..=10, digits otherwise
pub fn number_word(n: u32) -> String {
    const WORDS: [&str; 10] = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];
    match n {
        1..=10 => WORDS[(n - 1) as usize].to_string(),
        _ => n.to_string(),
    }
}

/// "Show me three fingers!"
pub fn show_number_text(n: u32) -> String {
    format!(
        "Show me {} finger{}!",
        number_word(n),
        if n == 1 { "" } else { "s" }
    )
}

/// Scripted phrase for a named cue key
pub fn scripted_phrase(key: &str) -> Phrase {
    match key {
        "hi_ready_to_play" => Phrase::tuned("Hi there! Ready to count with me?", Some(1.3), Some(0.7)),
        "show_me_your_fingers" => Phrase::plain("Show me your fingers!"),
        "show_one_finger" => Phrase::plain("Show me one finger to start!"),
        "lets_start_counting" => Phrase::plain("Let's count together!"),
        "try_again" => Phrase::tuned("Try again!", Some(1.3), None),
        "great_job" => Phrase::tuned("Great job!", Some(1.4), Some(0.8)),
        "amazing" => Phrase::plain("Amazing! You did it!"),
        other => Phrase::plain(other.replace('_', " ")),
    }
}

/// Fallback phrase for any catalog asset
pub fn fallback_phrase(id: &AssetId) -> Phrase {
    match id {
        AssetId::Number(n) => Phrase::plain(number_word(*n)),
        AssetId::PositiveFeedback(_) => scripted_phrase("great_job"),
        AssetId::Greeting(key) | AssetId::Instruction(key) | AssetId::Encouragement(key) => {
            scripted_phrase(key)
        }
    }
}

/// One resolvable server cue
#[derive(Debug, Clone, PartialEq)]
pub struct CueEntry {
    /// Identifier as sent by the server
    pub cue: String,
    pub asset: AssetId,
    /// Physical path (relative to the asset root)
    pub path: String,
    pub fallback: Phrase,
}

impl CueEntry {
    pub fn category(&self) -> AssetCategory {
        self.asset.category()
    }
}

/// Immutable cue identifier → asset table, validated at startup
pub struct CueTable {
    catalog: Arc<AudioCatalog>,
    entries: HashMap<String, CueEntry>,
    policies: FallbackConfig,
}

impl CueTable {
    /// Build the table and check that every cue the server may send for a
    /// game up to `max_number` resolves.
    pub fn build(catalog: Arc<AudioCatalog>, max_number: u32, policies: FallbackConfig) -> Result<Self> {
        let mut entries = HashMap::new();

        for n in 1..=catalog.max_number() {
            let asset = AssetId::Number(n);
            entries.insert(format!("{}{}", NUMBER_CUE_PREFIX, n), asset);
        }

        for (category, key) in catalog.named_keys() {
            if key.starts_with(NUMBER_CUE_PREFIX) {
                return Err(Error::Config(format!(
                    "catalog.{}.{}: the '{}' prefix is reserved for numbers",
                    category, key, NUMBER_CUE_PREFIX
                )));
            }
            let asset = match category {
                AssetCategory::Greetings => AssetId::Greeting(key.to_string()),
                AssetCategory::Instructions => AssetId::Instruction(key.to_string()),
                _ => AssetId::Encouragement(key.to_string()),
            };
            if let Some(existing) = entries.insert(key.to_string(), asset.clone()) {
                return Err(Error::Config(format!(
                    "cue '{}' is defined twice ({} and {})",
                    key, existing, asset
                )));
            }
        }

        let number_cues = (1..=max_number).map(|n| format!("{}{}", NUMBER_CUE_PREFIX, n));
        let missing: Vec<String> = REQUIRED_CUES
            .iter()
            .map(|c| c.to_string())
            .chain(number_cues)
            .filter(|c| !entries.contains_key(c))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "audio catalog is missing required cues: {}",
                missing.join(", ")
            )));
        }

        let entries = entries
            .into_iter()
            .filter_map(|(cue, asset)| {
                let path = catalog.resolve(&asset)?.to_string();
                let fallback = fallback_phrase(&asset);
                Some((cue.clone(), CueEntry { cue, asset, path, fallback }))
            })
            .collect();

        Ok(Self {
            catalog,
            entries,
            policies,
        })
    }

    /// Resolve a server cue identifier
    pub fn lookup(&self, cue: &str) -> Result<&CueEntry> {
        self.entries
            .get(cue)
            .ok_or_else(|| Error::Config(format!("No audio cue named '{}'", cue)))
    }

    /// Fresh random pick from the positive feedback list
    pub fn random_positive_feedback(&self) -> CueEntry {
        let asset = self.catalog.random_positive_feedback();
        CueEntry {
            cue: "positive_feedback".to_string(),
            path: self.catalog.resolve(&asset).unwrap_or_default().to_string(),
            fallback: fallback_phrase(&asset),
            asset,
        }
    }

    pub fn policy_for(&self, category: AssetCategory) -> FallbackPolicy {
        match category {
            AssetCategory::Numbers => self.policies.numbers,
            AssetCategory::Greetings => self.policies.greetings,
            AssetCategory::Instructions => self.policies.instructions,
            AssetCategory::PositiveFeedback => self.policies.positive_feedback,
            AssetCategory::Encouragement => self.policies.encouragement,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a cue ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueOutcome {
    /// Recorded asset played to the end
    Played,
    /// Scripted phrase spoken instead
    Spoken,
    /// Muted; nothing was output
    Muted,
    /// Platform refused output; parked until the next user gesture
    Deferred,
}

impl CueOutcome {
    /// Whether the cue counts as finished for the server
    pub fn is_finished(&self) -> bool {
        !matches!(self, CueOutcome::Deferred)
    }
}

/// Plays cues through the cache and playback controller
pub struct CuePlayer {
    cache: Arc<AudioAssetCache>,
    controller: Arc<PlaybackController>,
    table: Arc<CueTable>,
}

impl CuePlayer {
    pub fn new(
        cache: Arc<AudioAssetCache>,
        controller: Arc<PlaybackController>,
        table: Arc<CueTable>,
    ) -> Self {
        Self {
            cache,
            controller,
            table,
        }
    }

    pub fn table(&self) -> &Arc<CueTable> {
        &self.table
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn cache(&self) -> &Arc<AudioAssetCache> {
        &self.cache
    }

    /// Play a server cue by identifier under its category's policy
    pub async fn play_cue(&self, cue: &str) -> Result<CueOutcome> {
        let entry = self.table.lookup(cue)?.clone();
        self.play_entry(&entry).await
    }

    pub async fn play_entry(&self, entry: &CueEntry) -> Result<CueOutcome> {
        self.play_entry_scoped(entry, None).await
    }

    /// Like [`play_entry`](Self::play_entry); a refused asset is parked
    /// under `scope` so a later replay can be matched to its owner.
    pub async fn play_entry_scoped(
        &self,
        entry: &CueEntry,
        scope: Option<DeferredScope>,
    ) -> Result<CueOutcome> {
        let policy = self.table.policy_for(entry.category());
        debug!("Cue {} → {} ({:?})", entry.cue, entry.asset, policy);
        self.play_with_policy(&entry.asset, &entry.fallback, policy, scope)
            .await
    }

    pub async fn play_random_positive_feedback(
        &self,
        scope: Option<DeferredScope>,
    ) -> Result<CueOutcome> {
        let entry = self.table.random_positive_feedback();
        self.play_entry_scoped(&entry, scope).await
    }

    /// Direct asset play: failures always propagate
    pub async fn play_asset(&self, id: &AssetId) -> Result<CueOutcome> {
        self.play_with_policy(id, &fallback_phrase(id), FallbackPolicy::Strict, None)
            .await
    }

    async fn play_with_policy(
        &self,
        asset: &AssetId,
        fallback: &Phrase,
        policy: FallbackPolicy,
        scope: Option<DeferredScope>,
    ) -> Result<CueOutcome> {
        let resource = match self.cache.request(asset).await {
            Ok(resource) => resource,
            Err(e) => {
                return match policy {
                    FallbackPolicy::Strict => Err(e.into()),
                    FallbackPolicy::BestEffort => {
                        warn!("{} unavailable ({}), speaking fallback", asset, e);
                        self.speak_fallback(fallback).await
                    }
                };
            }
        };

        match self.controller.play_scoped(&resource, scope).await {
            Ok(PlayOutcome::Completed) => Ok(CueOutcome::Played),
            Ok(PlayOutcome::Muted) => Ok(CueOutcome::Muted),
            Err(PlaybackError::NotAllowed(reason)) => match policy {
                FallbackPolicy::BestEffort => Ok(CueOutcome::Deferred),
                FallbackPolicy::Strict => Err(PlaybackError::NotAllowed(reason).into()),
            },
            Err(e) => match policy {
                FallbackPolicy::BestEffort => self.speak_fallback(fallback).await,
                FallbackPolicy::Strict => Err(e.into()),
            },
        }
    }

    async fn speak_fallback(&self, phrase: &Phrase) -> Result<CueOutcome> {
        match self.controller.speak(&phrase.text, &phrase.options).await? {
            SpeakOutcome::Muted => Ok(CueOutcome::Muted),
            SpeakOutcome::Completed | SpeakOutcome::Cancelled => Ok(CueOutcome::Spoken),
        }
    }
}
