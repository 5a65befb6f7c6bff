//! Single-row durable counter storage.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Fixed identifier of the one tally row.
pub const TALLY_ROW_ID: u32 = 1;

/// The persisted tally row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyRecord {
    pub id: u32,
    pub count: u64,
}

impl TallyRecord {
    pub fn new(count: u64) -> Self {
        Self {
            id: TALLY_ROW_ID,
            count,
        }
    }
}

/// Durable storage of the vote counter.
///
/// Implementors provide the fallible primitives; the provided `get_count`
/// and `set_count` wrap them with the hot-path policy: reads fail open to
/// zero, writes clamp negatives and are logged no-ops on failure.
pub trait TallyStore: Send + Sync {
    /// Open the backing storage at `location`, creating and seeding the
    /// tally row with zero if absent. Calling this while connected succeeds
    /// without side effects.
    fn connect(&self, location: &Path) -> Result<(), StoreError>;

    /// Flush pending writes and release the backing storage.
    /// Safe to call when never connected or already disconnected.
    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Read the latest committed count.
    fn read_count(&self) -> Result<u64, StoreError>;

    /// Atomically replace the count.
    fn write_count(&self, count: u64) -> Result<(), StoreError>;

    /// The persisted count, or 0 if disconnected or unreadable.
    fn get_count(&self) -> u64 {
        match self.read_count() {
            Ok(count) => count,
            Err(StoreError::NotConnected) => {
                tracing::debug!("tally store not connected, reading count as 0");
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, "tally read failed, reading count as 0");
                0
            }
        }
    }

    /// Persist `value`, clamped to zero if negative.
    fn set_count(&self, value: i64) {
        let clamped = value.max(0) as u64;
        match self.write_count(clamped) {
            Ok(()) => {}
            Err(StoreError::NotConnected) => {
                tracing::warn!(count = clamped, "tally store not connected, dropping write");
            }
            Err(e) => {
                tracing::warn!(count = clamped, error = %e, "tally write failed");
            }
        }
    }
}
