/// Run-state accumulator: folds the classified event sequence into the
/// final fact set for one backup run.
use crate::classify::{EventKind, RunEvent, Variant};

/// Mutable working state for a single run.
///
/// Initialized to "no events seen, ok" and folded once per recognized
/// event. Owned exclusively by one run; frozen into [`RunFacts`] after
/// the stream is exhausted.
#[derive(Debug)]
pub struct RunState {
    variant: Variant,
    start_time: Option<i64>,
    prepare_time: Option<i64>,
    end_time: Option<i64>,
    prune_time: Option<i64>,
    error_seen: bool,
}

/// Final fact set, as epoch seconds and second durations.
///
/// Timestamps never observed stay at 0 (the epoch origin); derived
/// durations subtract through those zeros and can come out huge or
/// negative for incomplete runs. `success` is 0 for ok, 1 for failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunFacts {
    pub start_time: i64,
    pub end_time: i64,
    pub duration_seconds: i64,
    pub duration_preparing_seconds: i64,
    pub duration_pruning_seconds: i64,
    pub duration_overall_seconds: i64,
    pub success: i64,
}

impl RunState {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            start_time: None,
            prepare_time: None,
            end_time: None,
            prune_time: None,
            error_seen: false,
        }
    }

    /// Fold one event into the state.
    ///
    /// In the full grammar an error ends the run: the first error pins
    /// `end_time` and `prune_time` to its own timestamp and later
    /// cleaning/pruning lines no longer move them. The simple grammar
    /// does not pin; a finish line after an error still sets `end_time`.
    pub fn observe(&mut self, event: &RunEvent) {
        match event.kind {
            EventKind::Start => self.start_time = event.timestamp,
            EventKind::Prepare => self.prepare_time = event.timestamp,
            EventKind::End => {
                if !self.pinned() {
                    self.end_time = event.timestamp;
                }
            }
            EventKind::Prune => {
                if !self.pinned() {
                    self.prune_time = event.timestamp;
                }
            }
            EventKind::Error => {
                if !self.error_seen {
                    self.error_seen = true;
                    if self.variant == Variant::Full {
                        self.end_time = event.timestamp;
                        self.prune_time = event.timestamp;
                    }
                }
            }
        }
    }

    fn pinned(&self) -> bool {
        self.variant == Variant::Full && self.error_seen
    }

    /// Freeze the state into the output fact set.
    pub fn facts(&self) -> RunFacts {
        let start = self.start_time.unwrap_or(0);
        let prepare = self.prepare_time.unwrap_or(0);
        let end = self.end_time.unwrap_or(0);
        let prune = self.prune_time.unwrap_or(0);
        RunFacts {
            start_time: start,
            end_time: end,
            duration_seconds: end - start,
            duration_preparing_seconds: end - prepare,
            duration_pruning_seconds: prune - end,
            duration_overall_seconds: prune - start,
            success: if self.error_seen { 1 } else { 0 },
        }
    }
}
