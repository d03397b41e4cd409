//! Protocol mismatch diagnostics
//!
//! Events arriving in a phase that does not handle them are ignored for
//! control flow but counted here; repeated mismatches usually mean a
//! protocol bug on one side.

use crate::error::Error;
use crate::events::GamePhase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnexpectedCount {
    pub phase: GamePhase,
    pub event: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub unexpected_total: u64,
    /// Sorted by phase name, then event name
    pub unexpected: Vec<UnexpectedCount>,
    pub unknown_cues: u64,
    pub last_unexpected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    unexpected: HashMap<(GamePhase, &'static str), u64>,
    last_unexpected_at: Option<DateTime<Utc>>,
    /// Shared with cue sequencing tasks
    unknown_cues: Arc<AtomicU64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an ignored event; returns the count for this (phase, event)
    pub fn record_unexpected(&mut self, phase: GamePhase, event: &'static str) -> u64 {
        let count = self.unexpected.entry((phase, event)).or_insert(0);
        *count += 1;
        self.last_unexpected_at = Some(Utc::now());

        let err = Error::UnexpectedEvent { phase, event };
        if count.is_power_of_two() {
            warn!(count = *count, "{} (ignored)", err);
        } else {
            debug!(count = *count, "{} (ignored)", err);
        }
        *count
    }

    pub fn unexpected_count(&self, phase: GamePhase, event: &str) -> u64 {
        self.unexpected
            .iter()
            .filter(|((p, e), _)| *p == phase && *e == event)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn unexpected_total(&self) -> u64 {
        self.unexpected.values().sum()
    }

    pub fn last_unexpected_at(&self) -> Option<DateTime<Utc>> {
        self.last_unexpected_at
    }

    pub fn unknown_cue_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.unknown_cues)
    }

    pub fn unknown_cues(&self) -> u64 {
        self.unknown_cues.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut unexpected: Vec<UnexpectedCount> = self
            .unexpected
            .iter()
            .map(|((phase, event), count)| UnexpectedCount {
                phase: *phase,
                event: *event,
                count: *count,
            })
            .collect();
        unexpected.sort_by(|a, b| (a.phase.as_str(), a.event).cmp(&(b.phase.as_str(), b.event)));

        DiagnosticsSnapshot {
            unexpected_total: self.unexpected_total(),
            unexpected,
            unknown_cues: self.unknown_cues(),
            last_unexpected_at: self.last_unexpected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_phase_and_event() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.last_unexpected_at().is_none());

        assert_eq!(diagnostics.record_unexpected(GamePhase::Setup, "number_started"), 1);
        assert_eq!(diagnostics.record_unexpected(GamePhase::Setup, "number_started"), 2);
        diagnostics.record_unexpected(GamePhase::Completed, "gesture_detected");

        assert_eq!(diagnostics.unexpected_count(GamePhase::Setup, "number_started"), 2);
        assert_eq!(diagnostics.unexpected_total(), 3);
        assert!(diagnostics.last_unexpected_at().is_some());

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.unexpected[0].phase, GamePhase::Completed);
        assert_eq!(snapshot.unexpected[1].count, 2);
    }

    #[test]
    fn test_unknown_cue_counter_is_shared() {
        let diagnostics = Diagnostics::new();
        diagnostics.unknown_cue_counter().fetch_add(2, Ordering::Relaxed);
        assert_eq!(diagnostics.unknown_cues(), 2);
    }
}
