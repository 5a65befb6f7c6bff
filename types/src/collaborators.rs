//! Capabilities the core needs from its host.
//!
//! The tally never talks to a concrete server, console or clock; it is handed
//! implementations of these traits at construction time.

use crate::{DispatchError, Timestamp};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Executes a fully rendered reward command at console/system level.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &str) -> Result<(), DispatchError>;
}

/// The set of currently connected recipients and message delivery to them.
pub trait Audience: Send + Sync {
    /// Identifiers of every connected recipient, in the source's stable order.
    fn online_recipients(&self) -> Vec<String>;

    /// Whether `recipient` is currently reachable.
    fn is_online(&self, recipient: &str) -> bool;

    /// Deliver a message to one recipient.
    fn send_message(&self, recipient: &str, message: &str) -> Result<(), DispatchError>;

    /// Deliver a message to every connected recipient.
    fn broadcast(&self, message: &str) -> Result<(), DispatchError>;
}
