//! The vote party service: one explicit context object wiring the store,
//! tally, dispatcher, stats cache and ingestion together.
//!
//! Built once at startup and shared by reference with every collaborator
//! (the vote relay, stat pollers, admin commands).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use voteparty_store::TallyStore;
use voteparty_types::{Audience, Clock, CommandExecutor, VoteNotification};

use crate::config::ConfigHandle;
use crate::dispatcher::RewardDispatcher;
use crate::ingestion::VoteIngestion;
use crate::stats::{StatsSnapshot, TallyStats};
use crate::stats_cache::StatsCache;
use crate::tally::{VoteOutcome, VoteTally};
use crate::EngineError;

/// Host-provided capabilities.
pub struct Collaborators {
    pub store: Arc<dyn TallyStore>,
    pub console: Arc<dyn CommandExecutor>,
    pub audience: Arc<dyn Audience>,
    pub clock: Arc<dyn Clock>,
}

/// Snapshot for the admin status command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TallyStatus {
    pub current: u64,
    pub needed: u64,
    pub remaining: u64,
    #[serde(flatten)]
    pub counters: StatsSnapshot,
}

/// Explicit success/failure answer to an administrative action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdminAck {
    pub success: bool,
    pub message: String,
}

impl AdminAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub struct VotePartyService {
    config: Arc<ConfigHandle>,
    store: Arc<dyn TallyStore>,
    stats: Arc<TallyStats>,
    tally: Arc<VoteTally>,
    cache: Arc<StatsCache>,
    ingestion: Arc<VoteIngestion>,
    running: AtomicBool,
}

impl VotePartyService {
    /// Connect the store at the configured data directory and build the
    /// core. A connection failure is fatal: the feature must not start.
    pub fn start(config: Arc<ConfigHandle>, collaborators: Collaborators) -> Result<Self, EngineError> {
        let Collaborators {
            store,
            console,
            audience,
            clock,
        } = collaborators;

        let snapshot = config.snapshot();
        store.connect(&snapshot.data_dir)?;

        let stats = Arc::new(TallyStats::new());
        let dispatcher = RewardDispatcher::new(console, audience, Arc::clone(&stats));
        let tally = Arc::new(VoteTally::new(
            Arc::clone(&store),
            dispatcher,
            Arc::clone(&config),
            Arc::clone(&stats),
        ));
        let cache = Arc::new(StatsCache::new(
            Arc::clone(&tally),
            Arc::clone(&config),
            clock,
        ));
        let ingestion = Arc::new(VoteIngestion::new(Arc::clone(&tally)));

        tracing::info!(
            data_dir = %snapshot.data_dir.display(),
            count = tally.current_count(),
            threshold = snapshot.threshold(),
            "vote party service started"
        );

        Ok(Self {
            config,
            store,
            stats,
            tally,
            cache,
            ingestion,
            running: AtomicBool::new(true),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Arc<ConfigHandle> {
        &self.config
    }

    pub fn tally(&self) -> &Arc<VoteTally> {
        &self.tally
    }

    pub fn stats_cache(&self) -> &Arc<StatsCache> {
        &self.cache
    }

    pub fn ingestion(&self) -> &Arc<VoteIngestion> {
        &self.ingestion
    }

    /// Record a vote through the ingestion boundary.
    pub fn ingest(&self, notification: &VoteNotification) -> Result<Option<VoteOutcome>, EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotInitialized);
        }
        Ok(self.ingestion.handle(notification))
    }

    pub fn status(&self) -> TallyStatus {
        let current = self.tally.current_count();
        let needed = self.config.threshold();
        TallyStatus {
            current,
            needed,
            remaining: needed.saturating_sub(current),
            counters: self.stats.snapshot(),
        }
    }

    pub fn reset(&self) -> AdminAck {
        if !self.is_running() {
            return AdminAck::failed("Vote party service is not running");
        }
        self.tally.reset_votes();
        AdminAck::ok("Vote counter has been reset to 0!")
    }

    /// Re-read the config file and flush cached stats.
    pub fn reload(&self) -> AdminAck {
        match self.config.reload() {
            Ok(()) => {
                self.cache.invalidate_all();
                AdminAck::ok("All configs reloaded successfully.")
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to reload configuration");
                AdminAck::failed(format!("Failed to reload configs: {e}"))
            }
        }
    }

    /// Reload if the config file changed on disk since it was last read.
    /// `None` when there was nothing to reload.
    pub fn reload_if_stale(&self) -> Option<AdminAck> {
        if !self.is_running() || !self.config.is_stale() {
            return None;
        }
        tracing::info!("configuration file changed on disk, reloading");
        Some(self.reload())
    }

    /// Stop answering stat queries and release the store. Idempotent.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cache.disable();
        self.store.disconnect();
        tracing::info!("vote party service stopped");
    }
}

impl Drop for VotePartyService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VotePartyConfig;
    use voteparty_nullables::{NullAudience, NullClock, NullCommandExecutor, NullTallyStore};

    fn collaborators(store: Arc<NullTallyStore>) -> Collaborators {
        Collaborators {
            store,
            console: Arc::new(NullCommandExecutor::new()),
            audience: Arc::new(NullAudience::new()),
            clock: Arc::new(NullClock::new(0)),
        }
    }

    fn config(threshold: i64) -> Arc<ConfigHandle> {
        let mut config = VotePartyConfig::default();
        config.voteparty.total_votes = threshold;
        config.data_dir = "/tmp/voteparty-null".into();
        Arc::new(ConfigHandle::new(config))
    }

    #[test]
    fn start_fails_when_store_refuses_connection() {
        let store = Arc::new(NullTallyStore::new());
        store.refuse_connect(true);
        let result = VotePartyService::start(config(5), collaborators(store));
        assert!(matches!(
            result,
            Err(EngineError::Store(voteparty_store::StoreError::Connection(_)))
        ));
    }

    #[test]
    fn start_connects_at_data_dir_and_resumes_count() {
        let store = Arc::new(NullTallyStore::with_count(3));
        let service = VotePartyService::start(config(5), collaborators(store.clone())).unwrap();
        assert_eq!(store.location(), Some("/tmp/voteparty-null".into()));
        assert_eq!(service.status().current, 3);
        assert_eq!(service.status().remaining, 2);
    }

    #[test]
    fn reset_then_current_votes_is_zero() {
        let store = Arc::new(NullTallyStore::new());
        let service = VotePartyService::start(config(5), collaborators(store)).unwrap();
        service.ingest(&VoteNotification::received_now("alice")).unwrap();
        assert!(service.reset().success);
        assert_eq!(service.stats_cache().get_current_votes(), 0);
    }

    #[test]
    fn shutdown_disconnects_and_disables_queries() {
        let store = Arc::new(NullTallyStore::new());
        let service = VotePartyService::start(config(5), collaborators(store.clone())).unwrap();
        service.shutdown();
        service.shutdown();
        assert!(!store.is_connected());
        assert_eq!(service.stats_cache().query("current_votes"), None);
        assert!(matches!(
            service.ingest(&VoteNotification::received_now("late")),
            Err(EngineError::NotInitialized)
        ));
        assert!(!service.reset().success);
    }

    #[test]
    fn changed_config_file_is_picked_up_and_flushes_cache() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("voteparty.toml");
        std::fs::write(&path, "[voteparty]\ntotal_votes = 5").unwrap();
        let handle = Arc::new(ConfigHandle::load(&path).expect("load"));
        let service =
            VotePartyService::start(handle, collaborators(Arc::new(NullTallyStore::new()))).unwrap();

        assert_eq!(service.stats_cache().get_threshold(), 5);
        assert!(service.reload_if_stale().is_none());

        std::thread::sleep(std::time::Duration::from_millis(50));
        std::fs::write(&path, "[voteparty]\ntotal_votes = 12").unwrap();
        let ack = service.reload_if_stale().expect("file changed");
        assert!(ack.success);
        assert_eq!(service.stats_cache().get_threshold(), 12);
        assert!(service.reload_if_stale().is_none());
    }

    #[test]
    fn reload_of_in_memory_config_succeeds() {
        let store = Arc::new(NullTallyStore::new());
        let service = VotePartyService::start(config(5), collaborators(store)).unwrap();
        assert!(service.reload().success);
    }
}
