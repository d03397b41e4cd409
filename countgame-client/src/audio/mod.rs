//! Audio subsystem
//!
//! - `catalog`: static asset catalog and logical asset ids
//! - `loader`: fetch + validate asset bytes (HTTP or filesystem)
//! - `cache`: load deduplication and permanent in-memory cache
//! - `playback`: volume policy, mute, single active utterance, deferral
//! - `output`: headless output/speech primitives
//! - `cues`: server cue lookup table, fallback phrases, best-effort/strict play

pub mod cache;
pub mod catalog;
pub mod cues;
pub mod loader;
pub mod output;
pub mod playback;

pub use cache::{AudioAssetCache, LoadState};
pub use catalog::{AssetCategory, AssetId, AudioCatalog};
pub use cues::{CueEntry, CueOutcome, CuePlayer, CueTable, FallbackPolicy, Phrase};
pub use loader::{AssetLoader, AudioResource, FileAssetLoader, HttpAssetLoader};
pub use output::{HeadlessOutput, HeadlessSpeech};
pub use playback::{
    AudioOutput, DeferredScope, PlayOutcome, PlaybackController, Replayed, SpeakOutcome,
    SpeechDefaults, SpeechOptions, SpeechSynthesizer, Utterance,
};
