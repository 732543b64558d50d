//! Write transaction sequencing
//!
//! An [`LmdbWriter`] wraps at most one open LMDB write transaction. The
//! transaction begins lazily on the first write and may be committed in
//! batches via [`LmdbWriter::try_commit`]. The writer also holds the
//! used-lookup mark set: the dictionary hashes referenced by records
//! written in the current transaction. The set is cleared whenever the
//! transaction ends.

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;

use planb_core::{Error, Result};

/// Inline storage for a dictionary hash (4 or 8 bytes).
pub type HashKey = SmallVec<[u8; 8]>;

/// Sequences writes against one environment.
pub struct LmdbWriter<'e> {
    env: &'e Env,
    txn: Option<RwTxn<'e>>,
    change_count: usize,
    max_puts_before_commit: usize,
    marks: FxHashMap<String, FxHashSet<HashKey>>,
}

impl<'e> LmdbWriter<'e> {
    pub(crate) fn new(env: &'e Env, max_puts_before_commit: usize) -> Self {
        LmdbWriter {
            env,
            txn: None,
            change_count: 0,
            max_puts_before_commit,
            marks: FxHashMap::default(),
        }
    }

    /// Begin the write transaction if it is not already open.
    ///
    /// Blocks while another writer holds the environment.
    pub fn begin(&mut self) -> Result<()> {
        if self.txn.is_none() {
            self.txn = Some(self.env.write_txn()?);
        }
        Ok(())
    }

    /// The open write transaction, beginning one if needed.
    pub fn txn(&mut self) -> Result<&mut RwTxn<'e>> {
        self.begin()?;
        self.txn.as_mut().ok_or(Error::Closed)
    }

    /// Read view of the write transaction, including its uncommitted changes.
    pub fn read_txn(&mut self) -> Result<&RoTxn<'e>> {
        let txn: &RoTxn<'e> = self.txn()?;
        Ok(txn)
    }

    /// Write a record.
    pub fn put(&mut self, db: Database<Bytes, Bytes>, key: &[u8], value: &[u8]) -> Result<()> {
        db.put(self.txn()?, key, value)?;
        self.change_count += 1;
        Ok(())
    }

    /// Read a record as seen by this transaction.
    pub fn get(&mut self, db: Database<Bytes, Bytes>, key: &[u8]) -> Result<Option<&[u8]>> {
        let txn = self.read_txn()?;
        Ok(db.get(txn, key)?)
    }

    /// Delete a record; returns whether it existed.
    pub fn delete(&mut self, db: Database<Bytes, Bytes>, key: &[u8]) -> Result<bool> {
        let deleted = db.delete(self.txn()?, key)?;
        if deleted {
            self.change_count += 1;
        }
        Ok(deleted)
    }

    /// Number of changes since the last commit.
    pub fn change_count(&self) -> usize {
        self.change_count
    }

    /// Whether the current batch has reached its size limit.
    pub fn should_commit(&self) -> bool {
        self.max_puts_before_commit > 0 && self.change_count >= self.max_puts_before_commit
    }

    /// Commit if the batch is full.
    pub fn try_commit(&mut self) -> Result<()> {
        if self.should_commit() {
            self.commit()?;
        }
        Ok(())
    }

    /// Commit pending changes. A no-op if no transaction is open.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            let changes = self.change_count;
            self.change_count = 0;
            self.marks.clear();
            txn.commit()?;
            debug!(target: "planb::writer", changes, "Committed write transaction");
        }
        Ok(())
    }

    /// Discard pending changes.
    pub fn abort(&mut self) {
        if let Some(txn) = self.txn.take() {
            txn.abort();
            debug!(
                target: "planb::writer",
                changes = self.change_count,
                "Aborted write transaction"
            );
        }
        self.change_count = 0;
        self.marks.clear();
    }

    /// Mark `hash` in `dictionary` as used by this transaction.
    ///
    /// Returns `false` if it was already marked.
    pub fn mark_used(&mut self, dictionary: &str, hash: &[u8]) -> bool {
        if let Some(set) = self.marks.get_mut(dictionary) {
            return set.insert(HashKey::from_slice(hash));
        }
        let mut set = FxHashSet::default();
        set.insert(HashKey::from_slice(hash));
        self.marks.insert(dictionary.to_string(), set);
        true
    }

    /// Whether `hash` was marked in this transaction.
    pub fn is_marked(&self, dictionary: &str, hash: &[u8]) -> bool {
        self.marks
            .get(dictionary)
            .is_some_and(|set| set.contains(hash))
    }

    /// Hashes marked in `dictionary` by this transaction.
    pub fn marked(&self, dictionary: &str) -> impl Iterator<Item = &HashKey> + '_ {
        self.marks.get(dictionary).into_iter().flatten()
    }
}

impl Drop for LmdbWriter<'_> {
    fn drop(&mut self) {
        self.abort();
    }
}
