//! Nullable infrastructure for deterministic testing.
//!
//! Everything the vote party core touches outside its own state (clock,
//! durable storage, console command execution, connected recipients) is
//! abstracted behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Record what was asked of them
//! - Can be told to fail on demand
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod audience;
pub mod clock;
pub mod console;
pub mod store;

pub use audience::NullAudience;
pub use clock::NullClock;
pub use console::NullCommandExecutor;
pub use store::NullTallyStore;
