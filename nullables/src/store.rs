//! Nullable store — thread-safe in-memory tally storage for testing.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use voteparty_store::{StoreError, TallyStore};

/// An in-memory tally store for testing.
///
/// Keeps the count across disconnects, like a file would, and records every
/// successful write so tests can assert on the persisted sequence.
pub struct NullTallyStore {
    count: Mutex<u64>,
    location: Mutex<Option<PathBuf>>,
    writes: Mutex<Vec<u64>>,
    refuse_connect: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl NullTallyStore {
    pub fn new() -> Self {
        Self::with_count(0)
    }

    /// A store whose durable row already holds `count`.
    pub fn with_count(count: u64) -> Self {
        Self {
            count: Mutex::new(count),
            location: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            refuse_connect: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// A store that is already connected.
    pub fn connected() -> Self {
        let store = Self::new();
        *store.location.lock().unwrap() = Some(PathBuf::from("null"));
        store
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The durable value, bypassing connection state and failure injection.
    pub fn stored_count(&self) -> u64 {
        *self.count.lock().unwrap()
    }

    /// Every value successfully written, in order.
    pub fn writes(&self) -> Vec<u64> {
        self.writes.lock().unwrap().clone()
    }

    pub fn location(&self) -> Option<PathBuf> {
        self.location.lock().unwrap().clone()
    }
}

impl Default for NullTallyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TallyStore for NullTallyStore {
    fn connect(&self, location: &Path) -> Result<(), StoreError> {
        let mut current = self.location.lock().unwrap();
        if current.is_some() {
            return Ok(());
        }
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(StoreError::Connection(format!(
                "{} is unavailable",
                location.display()
            )));
        }
        *current = Some(location.to_path_buf());
        Ok(())
    }

    fn disconnect(&self) {
        self.location.lock().unwrap().take();
    }

    fn is_connected(&self) -> bool {
        self.location.lock().unwrap().is_some()
    }

    fn read_count(&self) -> Result<u64, StoreError> {
        if !self.is_connected() {
            return Err(StoreError::NotConnected);
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read("injected read failure".to_string()));
        }
        Ok(*self.count.lock().unwrap())
    }

    fn write_count(&self, count: u64) -> Result<(), StoreError> {
        if !self.is_connected() {
            return Err(StoreError::NotConnected);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write("injected write failure".to_string()));
        }
        let mut current = self.count.lock().unwrap();
        *current = count;
        self.writes.lock().unwrap().push(count);
        Ok(())
    }
}
