//! Abstract storage traits for the vote party tally.
//!
//! Every storage backend (LMDB, in-memory for testing) implements
//! [`TallyStore`]. The engine depends only on the trait.

pub mod error;
pub mod tally;

pub use error::StoreError;
pub use tally::{TallyRecord, TallyStore, TALLY_ROW_ID};
