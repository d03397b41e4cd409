//! Phase-scoped task scheduling
//!
//! Every phase entry advances the scheduler's generation. Work spawned
//! through the scheduler carries an [`EpochGuard`] for the generation it was
//! started in; once the generation moves on the guard reports stale and any
//! await wrapped in [`EpochGuard::run`] or [`EpochGuard::sleep`] returns
//! early. Stale work therefore never produces visible effects.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Generation token carried by scheduled work
#[derive(Clone, Debug)]
pub struct EpochGuard {
    epoch: u64,
    current: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl EpochGuard {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// `true` while the generation is unchanged and the task not cancelled
    pub fn is_current(&self) -> bool {
        !self.cancel.is_cancelled() && self.current.load(Ordering::SeqCst) == self.epoch
    }

    /// Resolves once this guard goes stale
    pub async fn stale(&self) {
        self.cancel.cancelled().await
    }

    /// Drive `fut` unless the guard goes stale first.
    ///
    /// Returns `None` when stale, in which case `fut` has been dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = fut => self.is_current().then_some(output),
        }
    }

    /// Sleep for `duration`; `false` if the guard went stale meanwhile
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.run(tokio::time::sleep(duration)).await.is_some()
    }
}

/// Handle to one scheduled task
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancel this task only
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end (panics inside the task are swallowed)
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

/// Owns the current generation and spawns guarded work
#[derive(Debug)]
pub struct TaskScheduler {
    current: Arc<AtomicU64>,
    generation_token: CancellationToken,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
            generation_token: CancellationToken::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Guard for the current generation
    pub fn guard(&self) -> EpochGuard {
        EpochGuard {
            epoch: self.generation(),
            current: Arc::clone(&self.current),
            cancel: self.generation_token.child_token(),
        }
    }

    /// Invalidate all outstanding work and start a new generation
    pub fn advance(&mut self) -> u64 {
        self.generation_token.cancel();
        self.generation_token = CancellationToken::new();
        let next = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Scheduler generation {}", next);
        next
    }

    /// Spawn `work` under a guard for the current generation
    pub fn spawn<F, Fut>(&self, name: &'static str, work: F) -> ScheduledTask
    where
        F: FnOnce(EpochGuard) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = self.guard();
        let cancel = guard.cancel.clone();
        let handle = tokio::spawn(work(guard));
        ScheduledTask {
            name,
            cancel,
            handle,
        }
    }

    /// Run `work` after `delay` unless the generation changes first
    pub fn schedule_after<F, Fut>(&self, name: &'static str, delay: Duration, work: F) -> ScheduledTask
    where
        F: FnOnce(EpochGuard) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(name, move |guard| async move {
            if guard.sleep(delay).await {
                work(guard).await;
            }
        })
    }

    /// Cancel everything, including work of the current generation
    pub fn shutdown(&mut self) {
        self.advance();
    }
}
