//! Content-addressed dictionary
//!
//! Maps a [`Hash`] of a payload to the payload itself. Equal payloads share
//! one entry. The full payload is kept, so a put whose hash is already taken
//! by a *different* payload is detected as a clash instead of silently
//! aliasing two values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, RoTxn};
use tracing::warn;

use planb_core::{Hash, HashFactory, Result};

use crate::env::PlanBEnv;
use crate::writer::{HashKey, LmdbWriter};

/// Outcome of [`HashLookupDb::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPut {
    /// The payload is stored under this hash (newly or already)
    Stored(Hash),
    /// The hash is taken by a different payload; nothing was written
    Clash(Hash),
}

/// A shape's dictionary store.
pub struct HashLookupDb {
    name: String,
    db: Database<Bytes, Bytes>,
    hash_factory: Arc<dyn HashFactory>,
    clashes: AtomicU64,
}

impl HashLookupDb {
    /// Open (or create) the named dictionary database in `env`.
    pub fn open(env: &PlanBEnv, name: &str, hash_factory: Arc<dyn HashFactory>) -> Result<Self> {
        let db = env.open_db(name)?;
        Ok(HashLookupDb {
            name: name.to_string(),
            db,
            hash_factory,
            clashes: AtomicU64::new(0),
        })
    }

    /// Dictionary name, also the key of its mark set in the writer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying database handle.
    pub fn db(&self) -> Database<Bytes, Bytes> {
        self.db
    }

    /// Width of the hashes used as keys.
    pub fn hash_length(&self) -> usize {
        self.hash_factory.hash_length()
    }

    /// Number of clashes seen since this handle was opened.
    pub fn clash_count(&self) -> u64 {
        self.clashes.load(Ordering::Relaxed)
    }

    /// Store `payload`, returning the hash that references it.
    ///
    /// First write wins: if the entry already exists nothing is written.
    pub fn put(&self, writer: &mut LmdbWriter<'_>, payload: &[u8]) -> Result<LookupPut> {
        let hash = self.hash_factory.create(payload);
        let key: HashKey = HashKey::from_vec(hash.to_bytes());
        let existing = writer.get(self.db, &key)?.map(|stored| stored == payload);
        match existing {
            Some(true) => Ok(LookupPut::Stored(hash)),
            Some(false) => {
                self.clashes.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "planb::dictionary",
                    dictionary = %self.name,
                    hash = %hash,
                    len = payload.len(),
                    "Hash clash, storing value inline"
                );
                Ok(LookupPut::Clash(hash))
            }
            None => {
                writer.put(self.db, &key, payload)?;
                Ok(LookupPut::Stored(hash))
            }
        }
    }

    /// Payload stored under `hash`.
    pub fn get<'t>(&self, txn: &'t RoTxn<'_>, hash: &[u8]) -> Result<Option<&'t [u8]>> {
        Ok(self.db.get(txn, hash)?)
    }

    /// Remove the entry for `hash`.
    pub fn delete(&self, writer: &mut LmdbWriter<'_>, hash: &[u8]) -> Result<bool> {
        writer.delete(self.db, hash)
    }

    /// Number of entries.
    pub fn len(&self, txn: &RoTxn<'_>) -> Result<u64> {
        Ok(self.db.len(txn)?)
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self, txn: &RoTxn<'_>) -> Result<bool> {
        Ok(self.db.is_empty(txn)?)
    }

    /// Visit every stored hash in key order. Stops at the first error.
    pub fn for_each_hash(
        &self,
        txn: &RoTxn<'_>,
        mut f: impl FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        for item in self.db.iter(txn)? {
            let (hash, _) = item?;
            f(hash)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HashLookupDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashLookupDb")
            .field("name", &self.name)
            .field("hash_length", &self.hash_length())
            .finish()
    }
}
