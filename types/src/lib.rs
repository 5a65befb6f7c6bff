//! Fundamental types shared by every vote party crate.
//!
//! Besides plain data (timestamps, notifications, reward rules) this crate
//! defines the capability traits the core depends on for everything outside
//! its own process state: time, command execution and recipient delivery.

pub mod collaborators;
pub mod error;
pub mod reward;
pub mod time;
pub mod vote;

pub use collaborators::{Audience, Clock, CommandExecutor, SystemClock};
pub use error::DispatchError;
pub use reward::{DistributionMode, RewardRule, RewardSet, UnknownDistributionMode, PLAYER_PLACEHOLDER};
pub use time::Timestamp;
pub use vote::VoteNotification;
