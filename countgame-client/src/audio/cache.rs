//! Audio asset cache
//!
//! Every catalog path is loaded at most once at a time. Concurrent requests
//! for a path that is already loading join the in-flight load and observe
//! its outcome. Successful loads stay cached for the process lifetime;
//! failures are not cached, so the next request starts a fresh load.

use super::catalog::{AssetId, AudioCatalog};
use super::loader::{AssetLoader, AudioResource};
use crate::error::ResourceLoadError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

type LoadOutcome = Result<Arc<AudioResource>, ResourceLoadError>;
type LoadFuture = Shared<BoxFuture<'static, LoadOutcome>>;

/// Externally visible state of one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Pending,
    Ready,
    /// Last attempt failed; the next request retries
    Failed,
}

#[derive(Default)]
struct CacheTables {
    ready: HashMap<String, Arc<AudioResource>>,
    pending: HashMap<String, LoadFuture>,
    failed: HashSet<String>,
}

/// Result of a [`AudioAssetCache::preload`] pass
#[derive(Debug, Default, Clone)]
pub struct PreloadReport {
    pub loaded: Vec<AssetId>,
    pub failed: Vec<(AssetId, ResourceLoadError)>,
}

/// Catalog-backed, deduplicating asset cache
pub struct AudioAssetCache {
    catalog: Arc<AudioCatalog>,
    loader: Arc<dyn AssetLoader>,
    tables: Arc<Mutex<CacheTables>>,
    loads_started: Arc<AtomicU64>,
}

impl AudioAssetCache {
    pub fn new(catalog: Arc<AudioCatalog>, loader: Arc<dyn AssetLoader>) -> Self {
        Self {
            catalog,
            loader,
            tables: Arc::new(Mutex::new(CacheTables::default())),
            loads_started: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn catalog(&self) -> &Arc<AudioCatalog> {
        &self.catalog
    }

    /// Resolve `id` and return the cached resource, joining or starting a load
    pub async fn request(&self, id: &AssetId) -> LoadOutcome {
        let path = self
            .catalog
            .resolve(id)
            .ok_or_else(|| ResourceLoadError::UnknownAsset(id.to_string()))?
            .to_string();
        self.request_path(path).await
    }

    async fn request_path(&self, path: String) -> LoadOutcome {
        let load = {
            let mut tables = self.tables.lock().await;
            if let Some(resource) = tables.ready.get(&path) {
                trace!("Cache hit: {}", path);
                return Ok(Arc::clone(resource));
            }
            match tables.pending.get(&path) {
                Some(in_flight) => {
                    debug!("Joining in-flight load: {}", path);
                    in_flight.clone()
                }
                None => {
                    let load = self.start_load(path.clone());
                    tables.failed.remove(&path);
                    tables.pending.insert(path.clone(), load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// The returned future settles the tables itself, so the outcome is
    /// recorded even when every requester has been dropped mid-load.
    fn start_load(&self, path: String) -> LoadFuture {
        let loader = Arc::clone(&self.loader);
        let tables = Arc::clone(&self.tables);
        let loads_started = Arc::clone(&self.loads_started);

        let load = async move {
            loads_started.fetch_add(1, Ordering::Relaxed);
            debug!("Loading audio asset: {}", path);

            let outcome = loader.load(&path).await.map(Arc::new);

            let mut tables = tables.lock().await;
            tables.pending.remove(&path);
            match &outcome {
                Ok(resource) => {
                    tables.ready.insert(path.clone(), Arc::clone(resource));
                }
                Err(e) => {
                    warn!("Audio asset load failed: {}", e);
                    tables.failed.insert(path.clone());
                }
            }
            outcome
        }
        .boxed()
        .shared();

        // Drive the load independently of the first requester
        tokio::spawn(load.clone());
        load
    }

    /// Current state of `id` (unknown ids report `NotLoaded`)
    pub async fn load_state(&self, id: &AssetId) -> LoadState {
        let Some(path) = self.catalog.resolve(id) else {
            return LoadState::NotLoaded;
        };
        let tables = self.tables.lock().await;
        if tables.ready.contains_key(path) {
            LoadState::Ready
        } else if tables.pending.contains_key(path) {
            LoadState::Pending
        } else if tables.failed.contains(path) {
            LoadState::Failed
        } else {
            LoadState::NotLoaded
        }
    }

    /// Number of underlying loader invocations so far
    pub fn loads_started(&self) -> u64 {
        self.loads_started.load(Ordering::Relaxed)
    }

    pub async fn ready_count(&self) -> usize {
        self.tables.lock().await.ready.len()
    }

    /// Load every id concurrently and wait for all of them to settle.
    ///
    /// Failures are reported, not fatal: an asset that fails here is simply
    /// retried on first use.
    pub async fn preload(&self, ids: &[AssetId]) -> PreloadReport {
        let results = futures::future::join_all(ids.iter().map(|id| async move {
            (id.clone(), self.request(id).await)
        }))
        .await;

        let mut report = PreloadReport::default();
        for (id, result) in results {
            match result {
                Ok(_) => report.loaded.push(id),
                Err(e) => report.failed.push((id, e)),
            }
        }

        info!(
            "Preloaded {} audio assets ({} failed)",
            report.loaded.len(),
            report.failed.len()
        );
        report
    }
}
