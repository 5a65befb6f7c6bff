//! Vote party engine.
//!
//! Tracks incoming votes against a configurable threshold and fires a
//! reward-distribution event exactly once per threshold crossing:
//! - [`VoteTally`] owns the count and the increment/check/reset protocol
//! - [`RewardDispatcher`] runs reward commands per recipient or server-wide
//! - [`StatsCache`] answers high-frequency stat polls with bounded staleness
//! - [`VoteIngestion`] / [`IngestionQueue`] feed notifications into the tally
//! - [`VotePartyService`] wires everything together for a host

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod service;
pub mod shutdown;
pub mod stats;
pub mod stats_cache;
pub mod tally;

pub use config::{ConfigHandle, PartyConfig, VotePartyConfig, VotingConfig};
pub use dispatcher::{DispatchReport, RewardDispatcher};
pub use error::EngineError;
pub use ingestion::{IngestionQueue, VoteIngestion};
pub use logging::{init_logging, LogFormat};
pub use service::{AdminAck, Collaborators, TallyStatus, VotePartyService};
pub use shutdown::ShutdownController;
pub use stats::{StatsSnapshot, TallyStats};
pub use stats_cache::{StatKey, StatsCache};
pub use tally::{VoteOutcome, VoteTally};
