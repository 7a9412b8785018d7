//! Bus counters for status views.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::{InvocationOutcome, PublishReport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusCounts {
    pub publishes: u64,
    pub noop_publishes: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub detached: u64,
}

/// Process-lifetime counters.
///
/// Per-invocation counts are taken by the invocation itself, so handlers that
/// finish after their publish returned early are still counted.
#[derive(Debug, Default)]
pub struct BusStats {
    publishes: AtomicU64,
    noop_publishes: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    detached: AtomicU64,
}

impl BusStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once per publish, when it returns.
    pub fn observe_publish(&self, report: &PublishReport) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        if report.is_noop() {
            self.noop_publishes.fetch_add(1, Ordering::Relaxed);
        }
        self.detached
            .fetch_add(report.pending as u64, Ordering::Relaxed);
    }

    /// Once per handler invocation, when its outcome is known.
    pub fn observe_outcome(&self, outcome: &InvocationOutcome) {
        let counter = match outcome {
            InvocationOutcome::Completed => &self.completed,
            InvocationOutcome::Failed(_) => &self.failed,
            InvocationOutcome::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> BusCounts {
        BusCounts {
            publishes: self.publishes.load(Ordering::Relaxed),
            noop_publishes: self.noop_publishes.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            detached: self.detached.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HandlerError, PublishId};

    #[test]
    fn publishes_and_outcomes_accumulate() {
        let stats = BusStats::new();

        stats.observe_publish(&PublishReport::new(PublishId::generate(), "a", 0));

        stats.observe_outcome(&InvocationOutcome::Completed);
        stats.observe_outcome(&InvocationOutcome::Failed(HandlerError::failed("x")));
        let mut report = PublishReport::new(PublishId::generate(), "b", 3);
        report.pending = 1;
        stats.observe_publish(&report);

        assert_eq!(
            stats.counts(),
            BusCounts {
                publishes: 2,
                noop_publishes: 1,
                completed: 1,
                failed: 1,
                skipped: 0,
                detached: 1,
            }
        );
    }
}
