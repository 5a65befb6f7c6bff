//! LMDB storage backend for the vote party tally.
//!
//! Implements [`voteparty_store::TallyStore`] using the `heed` LMDB bindings.
//! The tally row and the schema metadata live in two named databases within
//! a single environment directory.

pub mod environment;
pub mod error;
pub mod migration;
pub mod tally;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use tally::LmdbTallyStore;
