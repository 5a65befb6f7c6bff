//! Errors raised by external collaborators during reward dispatch.

use thiserror::Error;

/// A single failed reward action. Always isolated to that one action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}
