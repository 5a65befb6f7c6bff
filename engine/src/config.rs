//! Vote party configuration with TOML file support and live reload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use voteparty_types::RewardRule;

use crate::EngineError;

/// Configuration consumed by the vote party core.
///
/// Loaded from a TOML file via [`VotePartyConfig::from_toml_file`] or built
/// programmatically (e.g. for tests). A field holding a value of the wrong
/// type is logged and replaced by its default instead of failing the load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotePartyConfig {
    /// Directory holding the LMDB tally.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How long cached stat values (the threshold) may be served.
    #[serde(default = "default_stats_ttl_secs", deserialize_with = "lenient_stats_ttl")]
    pub stats_ttl_secs: u64,

    #[serde(default)]
    pub voting: VotingConfig,

    #[serde(default)]
    pub voteparty: PartyConfig,
}

/// Per-vote behaviour.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Acknowledgement sent to the voter if online. Blank disables it.
    #[serde(default, deserialize_with = "lenient_message")]
    pub message: String,

    /// Commands run for every vote, `%player%` bound to the voter.
    #[serde(default, deserialize_with = "lenient_rewards")]
    pub rewards: Vec<RewardRule>,
}

/// Vote party behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartyConfig {
    /// Votes needed to trigger a party.
    #[serde(default = "default_total_votes", deserialize_with = "lenient_total_votes")]
    pub total_votes: i64,

    /// "individual" or "server-wide". Unknown values disable party rewards.
    #[serde(default = "default_reward_type", deserialize_with = "lenient_reward_type")]
    pub reward_type: String,

    /// Sent to each recipient (individual) or broadcast once (server-wide).
    #[serde(default, deserialize_with = "lenient_message")]
    pub message: String,

    #[serde(default, deserialize_with = "lenient_rewards")]
    pub rewards: Vec<RewardRule>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./voteparty_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_ttl_secs() -> u64 {
    10
}

fn default_total_votes() -> i64 {
    25
}

fn default_reward_type() -> String {
    "individual".to_string()
}

/// Deserialize `T`, falling back to `default` (with a warning) when the
/// value is present but of the wrong shape.
fn lenient<'de, D, T>(deserializer: D, field: &str, default: fn() -> T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = toml::Value::deserialize(deserializer)?;
    match value.clone().try_into::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            tracing::warn!(field, value = %value, error = %e, "invalid config value, using default");
            Ok(default())
        }
    }
}

fn lenient_stats_ttl<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    lenient(d, "stats_ttl_secs", default_stats_ttl_secs)
}

fn lenient_total_votes<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    lenient(d, "voteparty.total_votes", default_total_votes)
}

fn lenient_reward_type<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient(d, "voteparty.reward_type", default_reward_type)
}

fn lenient_message<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient(d, "message", String::new)
}

fn lenient_rewards<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RewardRule>, D::Error> {
    lenient(d, "rewards", Vec::new)
}

// ── Impl ───────────────────────────────────────────────────────────────

impl VotePartyConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Effective threshold, never below 1.
    pub fn threshold(&self) -> u64 {
        self.voteparty.total_votes.max(1) as u64
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }
}

impl Default for VotePartyConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            stats_ttl_secs: default_stats_ttl_secs(),
            voting: VotingConfig::default(),
            voteparty: PartyConfig::default(),
        }
    }
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            total_votes: default_total_votes(),
            reward_type: default_reward_type(),
            message: String::new(),
            rewards: Vec::new(),
        }
    }
}

/// Shared, swappable view of the current configuration.
///
/// Readers take a cheap [`Arc`] snapshot; a reload swaps the whole config at
/// once, so a reader never sees half of an old and half of a new file.
pub struct ConfigHandle {
    source: Option<PathBuf>,
    current: RwLock<Arc<VotePartyConfig>>,
    loaded_at: Mutex<SystemTime>,
    overrides: Option<Box<Overrides>>,
}

type Overrides = dyn Fn(&mut VotePartyConfig) + Send + Sync;

impl ConfigHandle {
    /// A handle over an in-memory config with no backing file.
    pub fn new(config: VotePartyConfig) -> Self {
        Self {
            source: None,
            current: RwLock::new(Arc::new(config)),
            loaded_at: Mutex::new(SystemTime::now()),
            overrides: None,
        }
    }

    /// Load from `path` and remember it for [`ConfigHandle::reload`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let config = VotePartyConfig::from_toml_file(&path)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(Self {
            source: Some(path),
            current: RwLock::new(Arc::new(config)),
            loaded_at: Mutex::new(SystemTime::now()),
            overrides: None,
        })
    }

    /// Apply `adjust` to the current config and again after every reload,
    /// so values given on the command line win over the file.
    pub fn with_overrides<F>(mut self, adjust: F) -> Self
    where
        F: Fn(&mut VotePartyConfig) + Send + Sync + 'static,
    {
        let current = self.current.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut config = (**current).clone();
        adjust(&mut config);
        *current = Arc::new(config);
        self.overrides = Some(Box::new(adjust));
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn snapshot(&self) -> Arc<VotePartyConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn threshold(&self) -> u64 {
        self.snapshot().threshold()
    }

    /// Swap in a new configuration.
    pub fn replace(&self, config: VotePartyConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        *self.loaded_at.lock().unwrap_or_else(PoisonError::into_inner) = SystemTime::now();
    }

    /// Re-read the source file. On failure the previous config stays active
    /// and the file is not considered stale again until it changes.
    /// A handle without a source file has nothing to reload and succeeds.
    pub fn reload(&self) -> Result<(), EngineError> {
        let Some(path) = self.source.as_deref() else {
            return Ok(());
        };
        let mut config = match VotePartyConfig::from_toml_file(path) {
            Ok(config) => config,
            Err(e) => {
                *self.loaded_at.lock().unwrap_or_else(PoisonError::into_inner) = SystemTime::now();
                return Err(e);
            }
        };
        if let Some(adjust) = &self.overrides {
            adjust(&mut config);
        }
        self.replace(config);
        tracing::info!(path = %path.display(), "reloaded configuration");
        Ok(())
    }

    /// Whether the source file changed on disk since the last load attempt.
    pub fn is_stale(&self) -> bool {
        let Some(path) = self.source.as_deref() else {
            return false;
        };
        let loaded_at = *self.loaded_at.lock().unwrap_or_else(PoisonError::into_inner);
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(|modified| modified > loaded_at)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let mut config = VotePartyConfig::default();
        config.voteparty.rewards = vec![RewardRule::new("give %player% cake")];
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = VotePartyConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.voteparty.total_votes, 25);
        assert_eq!(parsed.voteparty.rewards, config.voteparty.rewards);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = VotePartyConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.threshold(), 25);
        assert_eq!(config.voteparty.reward_type, "individual");
        assert_eq!(config.stats_ttl(), Duration::from_secs(10));
        assert!(config.voting.rewards.is_empty());
    }

    #[test]
    fn full_toml_is_read() {
        let toml = r#"
            data_dir = "/var/lib/votes"
            [voting]
            message = "Thanks for voting!"
            rewards = ["give %player% diamond 1", "xp add %player% 10"]
            [voteparty]
            total_votes = 3
            reward_type = "server-wide"
            message = "Vote party!"
            rewards = ["weather clear"]
        "#;
        let config = VotePartyConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/votes"));
        assert_eq!(config.threshold(), 3);
        assert_eq!(config.voting.rewards.len(), 2);
        assert_eq!(config.voteparty.reward_type, "server-wide");
        assert_eq!(config.voteparty.rewards[0].command_template, "weather clear");
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let toml = r#"
            stats_ttl_secs = "soon"
            [voteparty]
            total_votes = "lots"
            rewards = "not a list"
        "#;
        let config = VotePartyConfig::from_toml_str(toml).expect("should still parse");
        assert_eq!(config.threshold(), 25);
        assert_eq!(config.stats_ttl_secs, 10);
        assert!(config.voteparty.rewards.is_empty());
    }

    #[test]
    fn threshold_is_clamped_to_one() {
        let config = VotePartyConfig::from_toml_str("[voteparty]\ntotal_votes = 0").unwrap();
        assert_eq!(config.threshold(), 1);
        let config = VotePartyConfig::from_toml_str("[voteparty]\ntotal_votes = -4").unwrap();
        assert_eq!(config.threshold(), 1);
    }

    #[test]
    fn unparsable_file_is_config_error() {
        assert!(matches!(
            VotePartyConfig::from_toml_str("[voteparty"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = ConfigHandle::load("/nonexistent/voteparty.toml");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn reload_picks_up_file_changes_and_keeps_old_on_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("voteparty.toml");
        std::fs::write(&path, "[voteparty]\ntotal_votes = 5").unwrap();

        let handle = ConfigHandle::load(&path).expect("load");
        assert_eq!(handle.threshold(), 5);

        std::fs::write(&path, "[voteparty]\ntotal_votes = 8").unwrap();
        handle.reload().expect("reload");
        assert_eq!(handle.threshold(), 8);

        std::fs::write(&path, "[voteparty").unwrap();
        assert!(handle.reload().is_err());
        assert_eq!(handle.threshold(), 8);
    }

    #[test]
    fn staleness_follows_file_mtime() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("voteparty.toml");
        std::fs::write(&path, "").unwrap();
        let handle = ConfigHandle::load(&path).expect("load");
        assert!(!handle.is_stale());

        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert!(handle.is_stale());

        assert!(!ConfigHandle::new(VotePartyConfig::default()).is_stale());
    }

    #[test]
    fn overrides_survive_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("voteparty.toml");
        std::fs::write(&path, "data_dir = \"/from/file\"\n[voteparty]\ntotal_votes = 5").unwrap();

        let handle = ConfigHandle::load(&path)
            .expect("load")
            .with_overrides(|config| config.data_dir = PathBuf::from("/from/cli"));
        assert_eq!(handle.snapshot().data_dir, PathBuf::from("/from/cli"));

        std::fs::write(&path, "data_dir = \"/from/file\"\n[voteparty]\ntotal_votes = 9").unwrap();
        handle.reload().expect("reload");
        assert_eq!(handle.threshold(), 9);
        assert_eq!(handle.snapshot().data_dir, PathBuf::from("/from/cli"));
    }

    #[test]
    fn failed_reload_is_reported_once_per_change() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("voteparty.toml");
        std::fs::write(&path, "").unwrap();
        let handle = ConfigHandle::load(&path).expect("load");

        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(&path, "[voteparty").unwrap();
        assert!(handle.is_stale());
        assert!(handle.reload().is_err());
        assert!(!handle.is_stale());
        assert_eq!(handle.threshold(), 25);
    }

    #[test]
    fn in_memory_handle_reload_is_noop() {
        let handle = ConfigHandle::new(VotePartyConfig::default());
        handle.reload().expect("nothing to reload");
        assert_eq!(handle.threshold(), 25);
    }
}
