//! LMDB implementation of TallyStore.

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use voteparty_store::{StoreError, TallyRecord, TallyStore, TALLY_ROW_ID};

use crate::environment::DEFAULT_MAP_SIZE;
use crate::migration::Migrator;
use crate::{LmdbEnvironment, LmdbError};

fn row_key() -> [u8; 4] {
    TALLY_ROW_ID.to_be_bytes()
}

/// The vote tally persisted in an LMDB environment directory.
///
/// Starts disconnected; [`TallyStore::connect`] opens the environment.
/// Every write is its own LMDB write transaction, so concurrent writers
/// never observe or produce a partial row.
pub struct LmdbTallyStore {
    map_size: usize,
    inner: RwLock<Option<LmdbEnvironment>>,
}

impl LmdbTallyStore {
    pub fn new() -> Self {
        Self::with_map_size(DEFAULT_MAP_SIZE)
    }

    pub fn with_map_size(map_size: usize) -> Self {
        Self {
            map_size,
            inner: RwLock::new(None),
        }
    }

    fn open(&self, location: &Path) -> Result<LmdbEnvironment, LmdbError> {
        let env = LmdbEnvironment::open(location, self.map_size)?;
        if let Err(e) = Migrator::run(&env).and_then(|()| seed_row(&env)) {
            if let Err(close_err) = env.close() {
                tracing::warn!(path = %location.display(), error = %close_err, "error closing tally store after failed connect");
            }
            return Err(e);
        }
        Ok(env)
    }
}

impl Default for LmdbTallyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the zero row if the tally has never been written.
fn seed_row(env: &LmdbEnvironment) -> Result<(), LmdbError> {
    let mut wtxn = env.env().write_txn()?;
    if env.tally_db.get(&wtxn, &row_key())?.is_none() {
        let bytes = bincode::serialize(&TallyRecord::new(0))?;
        env.tally_db.put(&mut wtxn, &row_key(), &bytes)?;
        tracing::info!(path = %env.path().display(), "seeded new tally row");
    }
    wtxn.commit()?;
    Ok(())
}

fn read_row(env: &LmdbEnvironment) -> Result<Option<TallyRecord>, LmdbError> {
    let rtxn = env.env().read_txn()?;
    match env.tally_db.get(&rtxn, &row_key())? {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
        None => Ok(None),
    }
}

fn write_row(env: &LmdbEnvironment, count: u64) -> Result<(), LmdbError> {
    let bytes = bincode::serialize(&TallyRecord::new(count))?;
    let mut wtxn = env.env().write_txn()?;
    env.tally_db.put(&mut wtxn, &row_key(), &bytes)?;
    wtxn.commit()?;
    Ok(())
}

impl TallyStore for LmdbTallyStore {
    fn connect(&self, location: &Path) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.is_some() {
            return Ok(());
        }

        match self.open(location) {
            Ok(env) => {
                tracing::info!(path = %location.display(), "connected to tally store");
                *inner = Some(env);
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = %location.display(), error = %e, "failed to connect to tally store");
                Err(StoreError::Connection(e.to_string()))
            }
        }
    }

    fn disconnect(&self) {
        let env = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(env) = env {
            let path = env.path().to_path_buf();
            match env.close() {
                Ok(()) => tracing::info!(path = %path.display(), "disconnected from tally store"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "error flushing tally store on close"),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn read_count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let env = inner.as_ref().ok_or(StoreError::NotConnected)?;
        match read_row(env) {
            Ok(Some(record)) => Ok(record.count),
            Ok(None) => Err(StoreError::Corruption("tally row is missing".to_string())),
            Err(e) => Err(StoreError::Read(e.to_string())),
        }
    }

    fn write_count(&self, count: u64) -> Result<(), StoreError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let env = inner.as_ref().ok_or(StoreError::NotConnected)?;
        write_row(env, count).map_err(|e| StoreError::Write(e.to_string()))
    }
}

impl Drop for LmdbTallyStore {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::CURRENT_SCHEMA_VERSION;

    #[test]
    fn connect_seeds_zero() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbTallyStore::new();
        store.connect(dir.path()).expect("connect");
        assert!(store.is_connected());
        assert_eq!(store.read_count().unwrap(), 0);
    }

    #[test]
    fn connect_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbTallyStore::new();
        store.connect(dir.path()).expect("connect");
        store.set_count(4);
        store.connect(dir.path()).expect("second connect");
        assert_eq!(store.get_count(), 4);
    }

    #[test]
    fn set_then_get_round_trips_and_clamps() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbTallyStore::new();
        store.connect(dir.path()).expect("connect");
        store.set_count(17);
        assert_eq!(store.get_count(), 17);
        store.set_count(-5);
        assert_eq!(store.get_count(), 0);
    }

    #[test]
    fn count_survives_reconnect() {
        let dir = tempfile::tempdir().expect("temp dir");
        {
            let store = LmdbTallyStore::new();
            store.connect(dir.path()).expect("connect");
            store.set_count(23);
            store.disconnect();
        }
        let store = LmdbTallyStore::new();
        store.connect(dir.path()).expect("reconnect");
        assert_eq!(store.get_count(), 23);
    }

    #[test]
    fn disconnected_store_fails_open() {
        let store = LmdbTallyStore::new();
        store.disconnect();
        store.set_count(5);
        assert_eq!(store.get_count(), 0);
        assert!(matches!(store.read_count(), Err(StoreError::NotConnected)));
    }

    #[test]
    fn disconnect_twice_is_harmless() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbTallyStore::new();
        store.connect(dir.path()).expect("connect");
        store.disconnect();
        store.disconnect();
        assert!(!store.is_connected());
    }

    #[test]
    fn failed_migration_releases_the_environment() {
        let dir = tempfile::tempdir().expect("temp dir");
        {
            let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).expect("open env");
            crate::migration::set_schema_version(&env, CURRENT_SCHEMA_VERSION + 1).unwrap();
            env.close().expect("close");
        }

        let store = LmdbTallyStore::new();
        assert!(matches!(
            store.connect(dir.path()),
            Err(StoreError::Connection(_))
        ));
        assert!(!store.is_connected());
        drop(store);

        // A still-registered environment would reject different open options.
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE * 2)
            .expect("directory is free again");
        env.close().expect("close");
    }

    #[test]
    fn connect_to_unusable_path_is_connection_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"not a directory").unwrap();
        let store = LmdbTallyStore::new();
        assert!(matches!(
            store.connect(&file),
            Err(StoreError::Connection(_))
        ));
        assert!(!store.is_connected());
    }
}
