//! LMDB environment setup.

use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

/// Default map size: the tally is one row, 16 MiB leaves room for metadata.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024;

const TALLY_DB: &str = "vote_count";
const META_DB: &str = "meta";

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    path: PathBuf,
    env: Env,
    pub(crate) tally_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per directory by this
        // process; `LmdbTallyStore` guards against double connects.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(2)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let tally_db = env.create_database(&mut wtxn, Some(TALLY_DB))?;
        let meta_db = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        Ok(Self {
            path: path.to_path_buf(),
            env,
            tally_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush to disk and close the environment, blocking until LMDB has
    /// released the directory.
    pub fn close(self) -> Result<(), LmdbError> {
        let synced = self.env.force_sync().map_err(LmdbError::from);
        self.env.prepare_for_closing().wait();
        synced
    }
}
