//! Time-bounded read cache for external stat pollers.
//!
//! Current votes always read through to the tally's atomic mirror. The
//! threshold comes from configuration and is cached for a fixed TTL.
//! Remaining votes derive from the two and are never cached themselves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use voteparty_types::{Clock, Timestamp};

use crate::config::ConfigHandle;
use crate::tally::VoteTally;

/// The named statistics exposed to pollers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatKey {
    CurrentVotes,
    TotalVotesNeeded,
    VotesRemaining,
}

impl StatKey {
    pub const ALL: [StatKey; 3] = [
        StatKey::CurrentVotes,
        StatKey::TotalVotesNeeded,
        StatKey::VotesRemaining,
    ];

    /// Placeholder-style identifier, e.g. `current_votes`.
    pub fn identifier(&self) -> &'static str {
        match self {
            StatKey::CurrentVotes => "current_votes",
            StatKey::TotalVotesNeeded => "total_votes_needed",
            StatKey::VotesRemaining => "votes_remaining",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.identifier() == identifier)
    }
}

#[derive(Clone, Copy, Debug)]
struct CacheEntry<T> {
    value: T,
    expires_at: Timestamp,
}

pub struct StatsCache {
    tally: Arc<VoteTally>,
    config: Arc<ConfigHandle>,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<StatKey, CacheEntry<u64>>>,
    enabled: AtomicBool,
}

impl StatsCache {
    pub fn new(
        tally: Arc<VoteTally>,
        config: Arc<ConfigHandle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tally,
            config,
            clock,
            entries: RwLock::new(HashMap::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Current `stats_ttl_secs`; a reload takes effect for entries stored after it.
    pub fn ttl(&self) -> Duration {
        self.config.snapshot().stats_ttl()
    }

    /// Real-time count, never cached.
    pub fn get_current_votes(&self) -> u64 {
        self.tally.current_count()
    }

    /// Effective threshold, served from cache while fresh.
    pub fn get_threshold(&self) -> u64 {
        self.cached(StatKey::TotalVotesNeeded, || self.config.threshold())
    }

    /// `max(0, threshold - current)`.
    pub fn get_votes_remaining(&self) -> u64 {
        self.get_threshold().saturating_sub(self.get_current_votes())
    }

    pub fn get(&self, key: StatKey) -> u64 {
        match key {
            StatKey::CurrentVotes => self.get_current_votes(),
            StatKey::TotalVotesNeeded => self.get_threshold(),
            StatKey::VotesRemaining => self.get_votes_remaining(),
        }
    }

    /// Answer a poller's query by identifier.
    ///
    /// `None` for an unknown identifier or once the cache has been disabled.
    pub fn query(&self, identifier: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let key = StatKey::from_identifier(identifier)?;
        Some(self.get(key).to_string())
    }

    pub fn invalidate(&self, key: StatKey) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    pub fn invalidate_all(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Stop answering queries and drop every cached entry.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.invalidate_all();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn cached(&self, key: StatKey, load: impl FnOnce() -> u64) -> u64 {
        let now = self.clock.now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&key) {
                if !entry.expires_at.is_reached(now) {
                    return entry.value;
                }
            }
        }

        let value = load();
        let entry = CacheEntry {
            value,
            expires_at: now.plus(self.ttl()),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
        tracing::trace!(stat = key.identifier(), value, "refreshed cached stat");
        value
    }
}
