//! Inbound vote notifications.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// One external vote, as relayed by the vote listener.
///
/// Transient: consumed exactly once by the tally and never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteNotification {
    pub subject_id: String,
    pub received_at: Timestamp,
}

impl VoteNotification {
    pub fn new(subject_id: impl Into<String>, received_at: Timestamp) -> Self {
        Self {
            subject_id: subject_id.into(),
            received_at,
        }
    }

    /// A notification stamped with the current system time.
    pub fn received_now(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Timestamp::now())
    }
}
