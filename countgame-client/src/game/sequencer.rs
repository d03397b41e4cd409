//! Cue sequencing
//!
//! Plays server cues strictly in order with a fixed pause between them and
//! reports each finished cue back to the server. The guard is checked
//! before every cue, after every await and before every report, so a
//! sequence from an abandoned generation stops without further effects.
//! A cue refused by the output ends its sequence; the machine reports it
//! if a user gesture replays it within the same generation.

use super::scheduler::EpochGuard;
use crate::audio::cues::{CueOutcome, CuePlayer};
use crate::audio::DeferredScope;
use crate::events::ClientEvent;
use crate::session::SessionHandle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct CueSequencer {
    player: Arc<CuePlayer>,
    outbound: SessionHandle,
    pause: Duration,
    unknown_cues: Arc<AtomicU64>,
}

impl CueSequencer {
    pub fn new(
        player: Arc<CuePlayer>,
        outbound: SessionHandle,
        pause: Duration,
        unknown_cues: Arc<AtomicU64>,
    ) -> Self {
        Self {
            player,
            outbound,
            pause,
            unknown_cues,
        }
    }

    pub fn player(&self) -> &Arc<CuePlayer> {
        &self.player
    }

    /// Play `cues` in order; returns `false` if abandoned part-way
    pub async fn play_sequence(&self, cues: &[String], guard: &EpochGuard) -> bool {
        for (i, cue) in cues.iter().enumerate() {
            if i > 0 && !guard.sleep(self.pause).await {
                debug!("Sequence abandoned during pause before {}", cue);
                return false;
            }
            if !self.play_one(cue, guard).await {
                return false;
            }
        }
        true
    }

    /// Play one cue; `false` when the sequence must stop
    pub async fn play_one(&self, cue: &str, guard: &EpochGuard) -> bool {
        if !guard.is_current() {
            debug!("Skipping stale cue {}", cue);
            return false;
        }

        let entry = match self.player.table().lookup(cue) {
            Ok(entry) => entry.clone(),
            Err(e) => {
                error!("{}", e);
                self.unknown_cues.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        };

        let scope = DeferredScope::cue(cue, guard.epoch());
        let Some(outcome) = guard
            .run(self.player.play_entry_scoped(&entry, Some(scope)))
            .await
        else {
            debug!("Cue {} abandoned mid-play", cue);
            return false;
        };

        match outcome {
            Ok(CueOutcome::Deferred) => {
                info!("Cue {} waiting for a user gesture, sequence stopped", cue);
                return false;
            }
            Ok(_) => {
                if !guard.is_current() {
                    return false;
                }
                if let Err(e) = self.outbound.send(ClientEvent::AudioFinished {
                    file: cue.to_string(),
                }) {
                    warn!("Could not report {} finished: {}", cue, e);
                }
            }
            Err(e) => warn!("Cue {} failed: {}", cue, e),
        }
        true
    }

    /// One random positive feedback cue. Not reported to the server, which
    /// never waits on it.
    pub async fn play_positive_feedback(&self, guard: &EpochGuard) {
        if !guard.is_current() {
            return;
        }
        let scope = DeferredScope::unreported(guard.epoch());
        match guard
            .run(self.player.play_random_positive_feedback(Some(scope)))
            .await
        {
            Some(Err(e)) => warn!("Positive feedback failed: {}", e),
            Some(Ok(outcome)) => debug!("Positive feedback: {:?}", outcome),
            None => debug!("Positive feedback abandoned"),
        }
    }
}
