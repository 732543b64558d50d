//! Per-shape LMDB environment
//!
//! A [`PlanBEnv`] owns the memory-mapped store of one state shape. It moves
//! through three states:
//!
//! ```text
//! Closed --first use--> Open --close()--> Shutdown
//! ```
//!
//! Every transaction runs inside [`PlanBEnv::read`] or [`PlanBEnv::write`],
//! which hold a shared guard on the state for the transaction's lifetime.
//! `close()` takes the exclusive side of that lock, so it waits for
//! in-flight transactions and no transaction can outlive the environment.
//!
//! Writers are serialised by LMDB itself: beginning a write transaction
//! blocks until the current writer commits or aborts.

use std::fs;
use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use planb_core::{Error, Result};

use crate::writer::LmdbWriter;

/// Named database holding a shape's primary records.
pub const PRIMARY_DB: &str = "primary";
/// Named database holding a shape's dictionary entries.
pub const DICTIONARY_DB: &str = "dictionary";

/// Map sizes are rounded up to this granularity, a multiple of every
/// common OS page size.
const MAP_SIZE_GRANULARITY: usize = 64 * 1024;

/// Settings for opening an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSettings {
    /// Maximum size of the memory map in bytes
    pub map_size: usize,
    /// Maximum number of named databases
    pub max_dbs: u32,
    /// Maximum number of concurrent read transactions
    pub max_readers: u32,
    /// Commit a batch after this many changes (0 = only at the end)
    pub max_puts_before_commit: usize,
}

impl Default for EnvSettings {
    fn default() -> Self {
        EnvSettings {
            map_size: 1 << 30,
            max_dbs: 4,
            max_readers: 126,
            max_puts_before_commit: 10_000,
        }
    }
}

impl EnvSettings {
    fn rounded_map_size(&self) -> usize {
        let n = self.map_size.max(MAP_SIZE_GRANULARITY);
        (n + MAP_SIZE_GRANULARITY - 1) / MAP_SIZE_GRANULARITY * MAP_SIZE_GRANULARITY
    }
}

enum EnvState {
    Closed,
    Open(Env),
    Shutdown,
}

/// Entry counts of every named database in an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvInfo {
    /// Environment directory
    pub path: PathBuf,
    /// `(database name, entry count)` pairs, sorted by name
    pub databases: Vec<(String, u64)>,
}

/// Owner of one memory-mapped store.
pub struct PlanBEnv {
    path: PathBuf,
    settings: EnvSettings,
    state: RwLock<EnvState>,
    dbs: Mutex<FxHashMap<String, Database<Bytes, Bytes>>>,
}

impl PlanBEnv {
    /// Create an environment rooted at `path`.
    ///
    /// Nothing touches the disk until first use.
    pub fn new(path: impl Into<PathBuf>, settings: EnvSettings) -> Self {
        PlanBEnv {
            path: path.into(),
            settings,
            state: RwLock::new(EnvState::Closed),
            dbs: Mutex::new(FxHashMap::default()),
        }
    }

    /// Environment directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Settings this environment was created with.
    pub fn settings(&self) -> &EnvSettings {
        &self.settings
    }

    /// Whether the store is currently mapped.
    pub fn is_open(&self) -> bool {
        matches!(*self.state.read(), EnvState::Open(_))
    }

    fn open_env(&self) -> Result<Env> {
        fs::create_dir_all(&self.path)?;
        let mut options = EnvOpenOptions::new();
        options
            .map_size(self.settings.rounded_map_size())
            .max_dbs(self.settings.max_dbs)
            .max_readers(self.settings.max_readers);
        // SAFETY: each environment directory is opened by exactly one
        // PlanBEnv, and the map is never modified outside LMDB.
        let env = unsafe { options.open(&self.path)? };
        info!(
            target: "planb::env",
            path = %self.path.display(),
            map_size = self.settings.rounded_map_size(),
            "Opened environment"
        );
        Ok(env)
    }

    /// Shared access to the open environment, opening it on first use.
    fn acquire(&self) -> Result<MappedRwLockReadGuard<'_, Env>> {
        loop {
            let guard = self.state.read_recursive();
            match RwLockReadGuard::try_map(guard, |state| match state {
                EnvState::Open(env) => Some(env),
                _ => None,
            }) {
                Ok(env) => return Ok(env),
                Err(guard) => {
                    if matches!(*guard, EnvState::Shutdown) {
                        return Err(Error::Closed);
                    }
                }
            }

            let mut state = self.state.write();
            if matches!(*state, EnvState::Closed) {
                *state = EnvState::Open(self.open_env()?);
            }
        }
    }

    /// Handle to the named database, creating it if needed.
    pub fn open_db(&self, name: &str) -> Result<Database<Bytes, Bytes>> {
        let mut dbs = self.dbs.lock();
        if let Some(db) = dbs.get(name) {
            return Ok(*db);
        }
        let env = self.acquire()?;
        let mut wtxn = env.write_txn()?;
        let db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(name))?;
        wtxn.commit()?;
        debug!(target: "planb::env", path = %self.path.display(), db = name, "Opened database");
        dbs.insert(name.to_string(), db);
        Ok(db)
    }

    /// Run `f` in a snapshot read transaction.
    pub fn read<R>(&self, f: impl FnOnce(&RoTxn<'_>) -> Result<R>) -> Result<R> {
        let env = self.acquire()?;
        let txn = env.read_txn()?;
        f(&txn)
    }

    /// Run `f` with a writer.
    ///
    /// Pending changes are committed when `f` returns `Ok` and aborted when
    /// it returns `Err`. Batches already committed by
    /// [`LmdbWriter::try_commit`] stay committed.
    pub fn write<R>(&self, f: impl FnOnce(&mut LmdbWriter<'_>) -> Result<R>) -> Result<R> {
        let env = self.acquire()?;
        let mut writer = LmdbWriter::new(&env, self.settings.max_puts_before_commit);
        match f(&mut writer) {
            Ok(r) => {
                writer.commit()?;
                Ok(r)
            }
            Err(e) => {
                writer.abort();
                Err(e)
            }
        }
    }

    /// Entry counts per named database.
    pub fn info(&self) -> Result<EnvInfo> {
        let mut dbs: Vec<(String, Database<Bytes, Bytes>)> = self
            .dbs
            .lock()
            .iter()
            .map(|(name, db)| (name.clone(), *db))
            .collect();
        dbs.sort_by(|a, b| a.0.cmp(&b.0));
        let databases = self.read(|txn| {
            dbs.iter()
                .map(|(name, db)| -> Result<(String, u64)> { Ok((name.clone(), db.len(txn)?)) })
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(EnvInfo {
            path: self.path.clone(),
            databases,
        })
    }

    /// Shut the environment down.
    ///
    /// Blocks until running transactions finish. Later calls to any method
    /// that needs the store return [`Error::Closed`]. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.write(), EnvState::Shutdown);
        self.dbs.lock().clear();
        if let EnvState::Open(env) = previous {
            env.prepare_for_closing().wait();
            info!(target: "planb::env", path = %self.path.display(), "Closed environment");
        }
        Ok(())
    }
}

impl std::fmt::Debug for PlanBEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanBEnv")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for PlanBEnv {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
