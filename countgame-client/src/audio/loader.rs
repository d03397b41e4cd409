//! Asset loaders
//!
//! A loader turns a catalog path into a validated [`AudioResource`]: bytes are
//! fetched (HTTP or filesystem), then probed with symphonia so that a file the
//! output could never play fails at load time rather than at play time.

use crate::error::ResourceLoadError;
use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Decoded-ready audio asset, shared by the cache and every player
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResource {
    /// Catalog path the resource was loaded from (cache key)
    pub key: String,
    /// Encoded bytes as fetched
    pub data: Arc<[u8]>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Playback length when the container reports a frame count
    pub duration: Option<Duration>,
}

impl AudioResource {
    /// Unprobed resource (no stream metadata)
    pub fn new(key: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            sample_rate: None,
            channels: None,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Source of asset bytes
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Load and validate the asset at `path` (relative to the asset root)
    async fn load(&self, path: &str) -> Result<AudioResource, ResourceLoadError>;
}

/// Fetches assets over HTTP from `base_url`
pub struct HttpAssetLoader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAssetLoader {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl AssetLoader for HttpAssetLoader {
    async fn load(&self, path: &str) -> Result<AudioResource, ResourceLoadError> {
        let url = self.url_for(path);
        let fetch_err = |reason: String| ResourceLoadError::Fetch {
            path: path.to_string(),
            reason,
        };

        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_err(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        probe_off_thread(path, Vec::from(bytes)).await
    }
}

/// Reads assets from a local directory
pub struct FileAssetLoader {
    base_dir: PathBuf,
}

impl FileAssetLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Build from a `file://` URL or a plain path
    pub fn from_base_path(base: &str) -> Self {
        Self::new(base.strip_prefix("file://").unwrap_or(base))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl AssetLoader for FileAssetLoader {
    async fn load(&self, path: &str) -> Result<AudioResource, ResourceLoadError> {
        let full = self.base_dir.join(path.trim_start_matches('/'));
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| ResourceLoadError::Fetch {
                path: path.to_string(),
                reason: format!("{}: {}", full.display(), e),
            })?;

        probe_off_thread(path, bytes).await
    }
}

async fn probe_off_thread(path: &str, bytes: Vec<u8>) -> Result<AudioResource, ResourceLoadError> {
    let key = path.to_string();
    tokio::task::spawn_blocking(move || probe_audio(&key, bytes))
        .await
        .map_err(|e| ResourceLoadError::Decode {
            path: path.to_string(),
            reason: format!("probe task failed: {}", e),
        })?
}

/// Validate that `bytes` hold a playable stream and read its parameters
pub fn probe_audio(path: &str, bytes: Vec<u8>) -> Result<AudioResource, ResourceLoadError> {
    let decode_err = |reason: String| ResourceLoadError::Decode {
        path: path.to_string(),
        reason,
    };

    if bytes.is_empty() {
        return Err(decode_err("empty file".to_string()));
    }

    let data: Arc<[u8]> = bytes.into();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(Arc::clone(&data))), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_err(format!("unrecognized format: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_err("no audio track".to_string()))?;
    let params = track.codec_params.clone();

    symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| decode_err(format!("unsupported codec: {}", e)))?;

    let duration = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => {
            Some(Duration::from_secs_f64(frames as f64 / rate as f64))
        }
        _ => None,
    };

    debug!(
        "Probed {}: {:?} Hz, {:?} channels, {:?}",
        path,
        params.sample_rate,
        params.channels.map(|c| c.count()),
        duration
    );

    Ok(AudioResource {
        key: path.to_string(),
        data,
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count() as u16),
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(dir: &Path, name: &str, sample_rate: u32, frames: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(((i % 100) as i16) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn test_file_loader_probes_wav() {
        let dir = TempDir::new().unwrap();
        write_wav(dir.path(), "numbers/one.wav", 8000, 4000);

        let loader = FileAssetLoader::new(dir.path());
        let resource = loader.load("numbers/one.wav").await.unwrap();

        assert_eq!(resource.key, "numbers/one.wav");
        assert_eq!(resource.sample_rate, Some(8000));
        assert_eq!(resource.channels, Some(1));
        assert_eq!(resource.duration, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_inspected_resource_keeps_fetched_bytes() {
        let dir = TempDir::new().unwrap();
        write_wav(dir.path(), "two.wav", 8000, 800);
        let bytes = std::fs::read(dir.path().join("two.wav")).unwrap();
        let expected = bytes.clone();

        let resource = probe_audio("two.wav", bytes).unwrap();

        assert_eq!(&*resource.data, expected.as_slice());
        assert_eq!(resource.duration, Some(Duration::from_millis(100)));
        // The format reader is gone; the resource holds the only reference
        assert_eq!(Arc::strong_count(&resource.data), 1);
    }

    #[tokio::test]
    async fn test_file_loader_missing_file_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let loader = FileAssetLoader::from_base_path(&format!("file://{}", dir.path().display()));
        let err = loader.load("numbers/nine.mp3").await.unwrap_err();
        assert!(matches!(err, ResourceLoadError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_decode_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.wav"), b"definitely not audio").unwrap();

        let loader = FileAssetLoader::new(dir.path());
        let err = loader.load("broken.wav").await.unwrap_err();
        assert!(matches!(err, ResourceLoadError::Decode { .. }));
    }

    #[test]
    fn test_http_url_join() {
        let loader = HttpAssetLoader::new(reqwest::Client::new(), "http://localhost:5000/assets/audio/");
        assert_eq!(
            loader.url_for("numbers/one.mp3"),
            "http://localhost:5000/assets/audio/numbers/one.mp3"
        );
    }
}
