//! Configuration management for the counting game client
//!
//! Bootstrap configuration comes from a single TOML file. Every field has a
//! built-in default, so running without a file is valid.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--server-url`, `--muted`, `--log-level`)
//! 2. `--config` path, then `COUNTGAME_CONFIG` environment variable
//! 3. Platform config file (`<config_dir>/countgame/config.toml`)
//! 4. Built-in defaults (code constants)

use crate::audio::cues::FallbackPolicy;
use crate::error::{Error, Result};
use crate::session::backoff::BackoffPolicy;
use countgame_common::config::{load_toml, resolve_config_path, CONFIG_ENV_VAR};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Complete client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Game server origin (scheme + host + port)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// SSE event stream / outbound event endpoint path
    #[serde(default = "default_events_path")]
    pub events_path: String,

    /// MJPEG video stream path (opaque to the client)
    #[serde(default = "default_video_path")]
    pub video_path: String,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub game: GameConfig,

    /// Audio catalog (logical cue keys → asset paths)
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_events_path() -> String {
    "/events".to_string()
}

fn default_video_path() -> String {
    "/video_feed".to_string()
}

/// Audio volumes, asset location and cue policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Asset root. Relative values are resolved against `server_url`;
    /// absolute URLs are used as-is; `file://` or absolute filesystem paths
    /// switch to the file loader.
    pub base_path: String,
    pub master_volume: f32,
    pub effects_volume: f32,
    pub speech_volume: f32,
    /// Pause between cues of a `play_audio_sequence`
    pub inter_cue_pause_ms: u64,
    /// Asset ids loaded at startup (`numbers.1`, `positive_feedback[0]`, ...)
    pub preload: Vec<String>,
    /// Missing-asset policy per catalog category
    pub fallback: FallbackConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            base_path: "assets/audio/".to_string(),
            master_volume: 0.7,
            effects_volume: 0.6,
            speech_volume: 0.8,
            inter_cue_pause_ms: 1000,
            preload: vec![
                "greetings.hi_ready_to_play".to_string(),
                "positive_feedback[0]".to_string(),
                "numbers.1".to_string(),
                "numbers.2".to_string(),
                "numbers.3".to_string(),
            ],
            fallback: FallbackConfig::default(),
        }
    }
}

impl AudioConfig {
    pub fn inter_cue_pause(&self) -> Duration {
        Duration::from_millis(self.inter_cue_pause_ms)
    }
}

/// Per-category fallback policy for server cues
#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    pub numbers: FallbackPolicy,
    pub greetings: FallbackPolicy,
    pub instructions: FallbackPolicy,
    pub positive_feedback: FallbackPolicy,
    pub encouragement: FallbackPolicy,
}

/// Synthetic speech defaults (slow and high for toddlers)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub rate: f32,
    pub pitch: f32,
    /// Voice names tried in order; first match wins
    pub preferred_voices: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate: 0.7,
            pitch: 1.2,
            preferred_voices: vec![
                "Google UK English Female".to_string(),
                "Microsoft Zira - English (United States)".to_string(),
                "Alex".to_string(),
                "Samantha".to_string(),
                "Karen".to_string(),
            ],
        }
    }
}

/// Reconnect policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Retries before the connection is declared dead
    pub max_attempts: u32,
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1000,
            backoff_cap_ms: 10_000,
            max_attempts: 5,
            connect_timeout_ms: 5000,
        }
    }
}

impl ConnectionConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_cap_ms),
            self.max_attempts,
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Game shape the server is expected to drive
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Highest number the server asks for (`number_1..=max_number` must exist)
    pub max_number: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { max_number: 5 }
    }
}

/// Raw audio catalog as written in the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// `"1" = "numbers/one.mp3"`
    pub numbers: BTreeMap<String, String>,
    pub greetings: BTreeMap<String, String>,
    pub instructions: BTreeMap<String, String>,
    pub positive_feedback: Vec<String>,
    pub encouragement: BTreeMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let words = [
            "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        ];
        let numbers = words
            .iter()
            .enumerate()
            .map(|(i, w)| ((i + 1).to_string(), format!("numbers/{}.mp3", w)))
            .collect();

        let pairs = |items: &[(&str, &str)]| -> BTreeMap<String, String> {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        Self {
            numbers,
            greetings: pairs(&[("hi_ready_to_play", "feedback/hi-there.mp3")]),
            instructions: pairs(&[
                ("show_me_your_fingers", "instructions/show-me-fingers.mp3"),
                ("show_one_finger", "instructions/show-one-finger.mp3"),
                ("lets_start_counting", "feedback/lets-count.mp3"),
            ]),
            positive_feedback: vec![
                "feedback/great-job.mp3".to_string(),
                "feedback/amazing.mp3".to_string(),
            ],
            encouragement: pairs(&[("try_again", "feedback/try-again.mp3")]),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full EnvFilter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "countgame_client=info,countgame_common=info".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            events_path: default_events_path(),
            video_path: default_video_path(),
            audio: AudioConfig::default(),
            speech: SpeechConfig::default(),
            connection: ConnectionConfig::default(),
            game: GameConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the resolved config file, or defaults when
    /// no file is found.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config = match resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml::<ClientConfig>(&path)?
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                ClientConfig::default()
            }
        };
        config.validated()
    }

    /// Parse configuration from TOML text (used by tests and embedders)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig = countgame_common::config::parse_toml(content)?;
        config.validated()
    }

    /// Clamp out-of-range values and reject unusable ones
    pub fn validated(mut self) -> Result<Self> {
        if self.server_url.trim().is_empty() {
            return Err(Error::Config("server_url must not be empty".to_string()));
        }
        self.server_url = self.server_url.trim_end_matches('/').to_string();

        if self.connection.max_attempts == 0 {
            return Err(Error::Config(
                "connection.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.connection.backoff_cap_ms < self.connection.backoff_base_ms {
            warn!(
                "connection.backoff_cap_ms ({}) below backoff_base_ms ({}), raising cap",
                self.connection.backoff_cap_ms, self.connection.backoff_base_ms
            );
            self.connection.backoff_cap_ms = self.connection.backoff_base_ms;
        }

        for (name, value) in [
            ("master_volume", &mut self.audio.master_volume),
            ("effects_volume", &mut self.audio.effects_volume),
            ("speech_volume", &mut self.audio.speech_volume),
        ] {
            let clamped = value.clamp(0.0, 1.0);
            if clamped != *value {
                warn!("audio.{} {} out of range, clamped to {}", name, value, clamped);
                *value = clamped;
            }
        }

        if self.game.max_number == 0 {
            return Err(Error::Config("game.max_number must be at least 1".to_string()));
        }

        Ok(self)
    }

    /// Full URL of the SSE/outbound event endpoint
    pub fn events_url(&self) -> String {
        join_url(&self.server_url, &self.events_path)
    }

    /// Full URL of the video stream
    pub fn video_url(&self) -> String {
        join_url(&self.server_url, &self.video_path)
    }

    /// Asset root as a URL, or `None` when assets come from the filesystem
    pub fn audio_base_url(&self) -> Option<String> {
        let base = &self.audio.base_path;
        if base.starts_with("file://") || Path::new(base).is_absolute() {
            None
        } else if base.starts_with("http://") || base.starts_with("https://") {
            Some(base.clone())
        } else {
            Some(join_url(&self.server_url, base))
        }
    }
}

fn join_url(origin: &str, path: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
