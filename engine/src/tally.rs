//! The vote tally: in-memory count mirror plus the serialized
//! increment → threshold check → party → reset protocol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use voteparty_store::TallyStore;

use crate::config::{ConfigHandle, VotePartyConfig};
use crate::dispatcher::RewardDispatcher;
use crate::stats::TallyStats;

/// Result of recording one vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    pub subject_id: String,
    /// Count right after this vote's increment.
    pub reached: u64,
    /// Threshold in effect when this vote was checked.
    pub threshold: u64,
    /// Whether this vote triggered the party (and reset the count).
    pub party_triggered: bool,
}

impl VoteOutcome {
    /// Count left standing once this vote finished.
    pub fn count_after(&self) -> u64 {
        if self.party_triggered {
            0
        } else {
            self.reached
        }
    }
}

/// Authoritative owner of the vote count.
///
/// `current_count` is a lock-free atomic read. All mutations go through
/// `vote_lock`, which also covers persistence and the party trigger, so
/// exactly one party fires per threshold crossing.
pub struct VoteTally {
    store: Arc<dyn TallyStore>,
    dispatcher: RewardDispatcher,
    config: Arc<ConfigHandle>,
    stats: Arc<TallyStats>,
    current: AtomicU64,
    vote_lock: Mutex<()>,
}

impl VoteTally {
    /// Seed the in-memory mirror from the store.
    pub fn new(
        store: Arc<dyn TallyStore>,
        dispatcher: RewardDispatcher,
        config: Arc<ConfigHandle>,
        stats: Arc<TallyStats>,
    ) -> Self {
        let initial = store.get_count();
        tracing::debug!(count = initial, "vote tally initialised");
        Self {
            store,
            dispatcher,
            config,
            stats,
            current: AtomicU64::new(initial),
            vote_lock: Mutex::new(()),
        }
    }

    pub fn current_count(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Record one vote for `subject_id`.
    ///
    /// The acknowledgement and per-vote rewards run first, outside the
    /// critical section; their failures never affect the count.
    pub fn record_vote(&self, subject_id: &str) -> VoteOutcome {
        let config = self.config.snapshot();
        self.dispatcher
            .acknowledge_vote(subject_id, &config.voting.message);
        self.dispatcher
            .execute_rewards(subject_id, &config.voting.rewards);

        let _guard = self.vote_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let reached = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.store.set_count(to_stored(reached));
        self.stats.inc_votes_recorded();

        // Re-read so a reload between the rewards above and now still counts.
        let config = self.config.snapshot();
        let threshold = config.threshold();
        tracing::info!(subject = subject_id, count = reached, threshold, "vote received");

        let party_triggered = reached >= threshold;
        if party_triggered {
            self.trigger_party(&config, reached);
            self.current.store(0, Ordering::Release);
            self.store.set_count(0);
        }

        VoteOutcome {
            subject_id: subject_id.to_string(),
            reached,
            threshold,
            party_triggered,
        }
    }

    fn trigger_party(&self, config: &VotePartyConfig, reached: u64) {
        let party = &config.voteparty;
        tracing::info!(count = reached, mode = %party.reward_type, "vote party triggered");
        self.dispatcher.trigger_vote_party(
            &party.reward_type,
            &party.rewards,
            &party.message,
            &party.message,
        );
        self.stats.inc_parties_triggered();
    }

    /// Administrative reset to zero, serialized with in-flight votes.
    pub fn reset_votes(&self) {
        let _guard = self.vote_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.current.store(0, Ordering::Release);
        self.store.set_count(0);
        tracing::info!("vote count reset");
    }
}

fn to_stored(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voteparty_nullables::{NullAudience, NullCommandExecutor, NullTallyStore};
    use voteparty_types::RewardRule;

    struct Fixture {
        tally: VoteTally,
        store: Arc<NullTallyStore>,
        console: Arc<NullCommandExecutor>,
        audience: Arc<NullAudience>,
        config: Arc<ConfigHandle>,
        stats: Arc<TallyStats>,
    }

    fn config_with(threshold: i64, mode: &str) -> VotePartyConfig {
        let mut config = VotePartyConfig::default();
        config.voteparty.total_votes = threshold;
        config.voteparty.reward_type = mode.to_string();
        config.voteparty.message = "Vote party!".to_string();
        config.voteparty.rewards = vec![RewardRule::new("party %player%")];
        config
    }

    fn fixture(config: VotePartyConfig, store: NullTallyStore, online: &[&str]) -> Fixture {
        let store = Arc::new(store);
        let console = Arc::new(NullCommandExecutor::new());
        let audience = Arc::new(NullAudience::with_online(online.iter().copied()));
        let stats = Arc::new(TallyStats::new());
        let config = Arc::new(ConfigHandle::new(config));
        let dispatcher = RewardDispatcher::new(console.clone(), audience.clone(), stats.clone());
        let tally = VoteTally::new(store.clone(), dispatcher, config.clone(), stats.clone());
        Fixture {
            tally,
            store,
            console,
            audience,
            config,
            stats,
        }
    }

    #[test]
    fn initial_count_comes_from_store() {
        let store = NullTallyStore::with_count(7);
        store.connect(std::path::Path::new("null")).unwrap();
        let f = fixture(config_with(25, "individual"), store, &[]);
        assert_eq!(f.tally.current_count(), 7);
    }

    #[test]
    fn third_vote_triggers_party_and_resets() {
        let f = fixture(config_with(3, "server-wide"), NullTallyStore::connected(), &[]);

        let a = f.tally.record_vote("alice");
        let b = f.tally.record_vote("bob");
        assert!(!a.party_triggered && !b.party_triggered);
        assert_eq!(f.tally.current_count(), 2);

        let c = f.tally.record_vote("carol");
        assert!(c.party_triggered);
        assert_eq!(c.reached, 3);
        assert_eq!(c.count_after(), 0);
        assert_eq!(f.tally.current_count(), 0);
        assert_eq!(f.store.stored_count(), 0);
        assert_eq!(f.store.writes(), vec![1, 2, 3, 0]);
        assert_eq!(f.console.count_of("party %player%"), 1);
        assert_eq!(f.stats.parties_triggered(), 1);
    }

    #[test]
    fn threshold_is_read_at_check_time() {
        let f = fixture(config_with(10, "server-wide"), NullTallyStore::connected(), &[]);
        f.tally.record_vote("a");
        f.tally.record_vote("b");
        f.config.replace(config_with(2, "server-wide"));
        let outcome = f.tally.record_vote("c");
        assert!(outcome.party_triggered);
        assert_eq!(outcome.threshold, 2);
    }

    #[test]
    fn zero_threshold_behaves_as_one() {
        let f = fixture(config_with(0, "server-wide"), NullTallyStore::connected(), &[]);
        assert!(f.tally.record_vote("a").party_triggered);
        assert!(f.tally.record_vote("b").party_triggered);
        assert_eq!(f.stats.parties_triggered(), 2);
    }

    #[test]
    fn per_vote_rewards_run_even_when_voter_offline() {
        let mut config = config_with(25, "individual");
        config.voting.message = "Thanks!".to_string();
        config.voting.rewards = vec![RewardRule::new("give %player% key")];
        let f = fixture(config, NullTallyStore::connected(), &["alice"]);

        f.tally.record_vote("alice");
        f.tally.record_vote("ghost");

        assert_eq!(f.console.attempted(), vec!["give alice key", "give ghost key"]);
        assert_eq!(f.audience.messages(), vec![("alice".to_string(), "Thanks!".to_string())]);
        assert_eq!(f.tally.current_count(), 2);
    }

    #[test]
    fn failing_per_vote_reward_still_counts() {
        let mut config = config_with(25, "individual");
        config.voting.rewards = vec![RewardRule::new("broken %player%")];
        let f = fixture(config, NullTallyStore::connected(), &[]);
        f.console.fail_when_contains("broken");
        f.tally.record_vote("alice");
        assert_eq!(f.tally.current_count(), 1);
        assert_eq!(f.store.stored_count(), 1);
    }

    #[test]
    fn reset_zeroes_mirror_and_store() {
        let f = fixture(config_with(25, "individual"), NullTallyStore::connected(), &[]);
        f.tally.record_vote("a");
        f.tally.record_vote("b");
        f.tally.reset_votes();
        assert_eq!(f.tally.current_count(), 0);
        assert_eq!(f.store.stored_count(), 0);
    }

    #[test]
    fn disconnected_store_still_counts_in_memory() {
        let f = fixture(config_with(25, "individual"), NullTallyStore::new(), &[]);
        assert_eq!(f.tally.current_count(), 0);
        f.tally.record_vote("a");
        assert_eq!(f.tally.current_count(), 1);
        assert!(f.store.writes().is_empty());
    }

    #[test]
    fn unknown_mode_still_resets() {
        let f = fixture(config_with(1, "everyone"), NullTallyStore::connected(), &["alice"]);
        let outcome = f.tally.record_vote("alice");
        assert!(outcome.party_triggered);
        assert_eq!(f.tally.current_count(), 0);
        assert!(f.console.attempted().is_empty());
    }

    #[test]
    fn concurrent_votes_trigger_exactly_floor_n_over_t_parties() {
        const THREADS: usize = 8;
        const VOTES_PER_THREAD: usize = 125;
        const THRESHOLD: i64 = 7;

        let f = Arc::new(fixture(
            config_with(THRESHOLD, "server-wide"),
            NullTallyStore::connected(),
            &[],
        ));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let f = Arc::clone(&f);
                std::thread::spawn(move || {
                    for i in 0..VOTES_PER_THREAD {
                        f.tally.record_vote(&format!("voter-{t}-{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let n = (THREADS * VOTES_PER_THREAD) as u64;
        let t = THRESHOLD as u64;
        assert_eq!(f.stats.parties_triggered(), n / t);
        assert_eq!(f.console.count_of("party %player%") as u64, n / t);
        assert_eq!(f.tally.current_count(), n % t);
        assert_eq!(f.store.stored_count(), n % t);
    }

    #[test]
    fn reset_is_serialized_with_concurrent_votes() {
        const THREADS: usize = 6;
        const VOTES_PER_THREAD: usize = 200;
        const THRESHOLD: i64 = 11;

        let f = Arc::new(fixture(
            config_with(THRESHOLD, "server-wide"),
            NullTallyStore::connected(),
            &[],
        ));

        let voters: Vec<_> = (0..THREADS)
            .map(|t| {
                let f = Arc::clone(&f);
                std::thread::spawn(move || {
                    for i in 0..VOTES_PER_THREAD {
                        let outcome = f.tally.record_vote(&format!("voter-{t}-{i}"));
                        assert!(outcome.count_after() < THRESHOLD as u64);
                    }
                })
            })
            .collect();
        let resetter = {
            let f = Arc::clone(&f);
            std::thread::spawn(move || {
                for _ in 0..20 {
                    f.tally.reset_votes();
                    std::thread::yield_now();
                }
            })
        };
        for h in voters {
            h.join().unwrap();
        }
        resetter.join().unwrap();

        let n = (THREADS * VOTES_PER_THREAD) as u64;
        let t = THRESHOLD as u64;
        let current = f.tally.current_count();
        assert_eq!(f.store.stored_count(), current);
        assert!(current < t);
        assert!(f.stats.parties_triggered() <= n / t);
        assert_eq!(f.stats.votes_recorded(), n);
        assert_eq!(
            f.console.count_of("party %player%") as u64,
            f.stats.parties_triggered()
        );
        // Writes never exceed the threshold.
        assert!(f.store.writes().iter().all(|&w| w <= t));
    }
}
