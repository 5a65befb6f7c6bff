//! Process-lifetime counters for the tally.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters updated by the tally and the reward dispatcher.
/// Not persisted; reset on restart.
#[derive(Debug, Default)]
pub struct TallyStats {
    votes_recorded: AtomicU64,
    parties_triggered: AtomicU64,
    dispatch_failures: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub votes_recorded: u64,
    pub parties_triggered: u64,
    pub dispatch_failures: u64,
}

impl TallyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_votes_recorded(&self) {
        self.votes_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_parties_triggered(&self) {
        self.parties_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_dispatch_failures(&self, n: u64) {
        if n > 0 {
            self.dispatch_failures.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn votes_recorded(&self) -> u64 {
        self.votes_recorded.load(Ordering::Relaxed)
    }

    pub fn parties_triggered(&self) -> u64 {
        self.parties_triggered.load(Ordering::Relaxed)
    }

    pub fn dispatch_failures(&self) -> u64 {
        self.dispatch_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            votes_recorded: self.votes_recorded(),
            parties_triggered: self.parties_triggered(),
            dispatch_failures: self.dispatch_failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = TallyStats::new();
        stats.inc_votes_recorded();
        stats.inc_votes_recorded();
        stats.inc_parties_triggered();
        stats.add_dispatch_failures(0);
        stats.add_dispatch_failures(3);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                votes_recorded: 2,
                parties_triggered: 1,
                dispatch_failures: 3,
            }
        );
    }
}
