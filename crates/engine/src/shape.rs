//! Generic state shape over one environment
//!
//! A shape pairs a key codec and a value codec with its own LMDB
//! environment holding two named databases: the primary records and the
//! value dictionary. [`ShapeDb`] provides the typed operations every
//! concrete shape builds on; the concrete shapes in [`crate::shapes`] add
//! their domain queries on top.
//!
//! ## Merging
//!
//! [`ShapeDb::merge`] folds a shard written elsewhere (same shape, same
//! config) into this one and then deletes the shard. Records with inline
//! values are copied byte for byte. Records referencing the shard's
//! dictionary are decoded there and re-encoded against this shape's
//! dictionary, since hashes of the two dictionaries need not agree.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use heed::types::Bytes;
use heed::{Database, RoTxn};
use tracing::{debug, info, warn};

use planb_core::{Cancellation, Error, HashFactory, QueryField, Result, TemporalIndex};
use planb_storage::codec::VariableValSerde;
use planb_storage::{
    EnvSettings, HashLookupDb, KeySerde, LiveRecords, LmdbWriter, PlanBEnv, RecordPart,
    Serde, SweepStats, UsedLookupsRecorder, DICTIONARY_DB, PRIMARY_DB,
};

/// Storage handed to a shape at registration.
#[derive(Clone)]
pub struct ShapeContext {
    name: String,
    env: Arc<PlanBEnv>,
    dictionary: Arc<HashLookupDb>,
    hash_factory: Arc<dyn HashFactory>,
    inline_threshold: usize,
}

impl ShapeContext {
    /// Context for shape `name` stored under `dir`.
    ///
    /// Opens the environment and the dictionary database.
    pub fn open(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        settings: EnvSettings,
        hash_factory: Arc<dyn HashFactory>,
        inline_threshold: usize,
    ) -> Result<Self> {
        let env = Arc::new(PlanBEnv::new(dir, settings));
        let dictionary = Arc::new(HashLookupDb::open(
            &env,
            DICTIONARY_DB,
            Arc::clone(&hash_factory),
        )?);
        Ok(ShapeContext {
            name: name.into(),
            env,
            dictionary,
            hash_factory,
            inline_threshold,
        })
    }

    /// Context for the same shape stored under `dir`, with identical
    /// settings, hashing and inline threshold.
    pub fn sibling(&self, dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(
            self.name.clone(),
            dir,
            *self.env.settings(),
            Arc::clone(&self.hash_factory),
            self.inline_threshold,
        )
    }

    /// Shape name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shape's environment.
    pub fn env(&self) -> &Arc<PlanBEnv> {
        &self.env
    }

    /// The shape's dictionary.
    pub fn dictionary(&self) -> &Arc<HashLookupDb> {
        &self.dictionary
    }

    /// Value codec spilling long values into this shape's dictionary.
    pub fn variable_val_serde(&self) -> Arc<VariableValSerde> {
        Arc::new(VariableValSerde::new(
            Arc::clone(&self.dictionary),
            self.inline_threshold,
        ))
    }
}

impl std::fmt::Debug for ShapeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeContext")
            .field("name", &self.name)
            .field("path", &self.env.path())
            .field("inline_threshold", &self.inline_threshold)
            .finish()
    }
}

/// Codecs and catalogue of a shape.
pub struct ShapeDescriptor<K, V> {
    /// Shape name
    pub name: String,
    /// Key codec
    pub key_serde: Arc<dyn KeySerde<K>>,
    /// Value codec
    pub value_serde: Arc<dyn Serde<V>>,
    /// Slot mapping, for temporal shapes
    pub temporal_index: Option<Arc<dyn TemporalIndex>>,
    /// Queryable fields
    pub fields: &'static [QueryField],
    /// Folds an incoming value into an existing one during a merge
    pub combine: Option<fn(V, V) -> V>,
}

impl<K, V> ShapeDescriptor<K, V> {
    /// Descriptor without a temporal index.
    pub fn new(
        name: impl Into<String>,
        key_serde: Arc<dyn KeySerde<K>>,
        value_serde: Arc<dyn Serde<V>>,
        fields: &'static [QueryField],
    ) -> Self {
        ShapeDescriptor {
            name: name.into(),
            key_serde,
            value_serde,
            temporal_index: None,
            fields,
            combine: None,
        }
    }

    /// Attach a temporal index.
    pub fn with_temporal_index(mut self, index: Arc<dyn TemporalIndex>) -> Self {
        self.temporal_index = Some(index);
        self
    }

    /// Combine colliding values on merge instead of keeping the incoming one.
    pub fn with_combine(mut self, combine: fn(V, V) -> V) -> Self {
        self.combine = Some(combine);
        self
    }
}

/// Record and dictionary counts of a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeInfo {
    /// Shape name
    pub name: String,
    /// Environment directory
    pub path: PathBuf,
    /// Primary records
    pub records: u64,
    /// Dictionary entries
    pub dictionary_entries: u64,
    /// Dictionary puts that fell back to inline storage
    pub clashes: u64,
}

/// Outcome of a retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionStats {
    /// Primary records deleted
    pub deleted: u64,
    /// Dictionary sweep run after the deletes
    pub sweep: SweepStats,
}

/// Outcome of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records copied without decoding
    pub copied: u64,
    /// Records decoded from the source and re-encoded
    pub rewritten: u64,
}

impl MergeStats {
    /// Source records written to the target.
    pub fn total(&self) -> u64 {
        self.copied + self.rewritten
    }
}

/// Typed access to one shape's records.
pub struct ShapeDb<K, V> {
    name: String,
    key_serde: Arc<dyn KeySerde<K>>,
    value_serde: Arc<dyn Serde<V>>,
    temporal_index: Option<Arc<dyn TemporalIndex>>,
    fields: &'static [QueryField],
    combine: Option<fn(V, V) -> V>,
    ctx: ShapeContext,
    primary: Database<Bytes, Bytes>,
    recorder: Arc<dyn UsedLookupsRecorder>,
}

impl<K, V> ShapeDb<K, V> {
    /// Open the primary database of `ctx` with the codecs of `descriptor`.
    pub fn open(ctx: &ShapeContext, descriptor: ShapeDescriptor<K, V>) -> Result<Self> {
        let primary = ctx.env.open_db(PRIMARY_DB)?;
        let recorder = descriptor.value_serde.used_lookups_recorder();
        debug!(
            target: "planb::shape",
            shape = %descriptor.name,
            path = %ctx.env.path().display(),
            "Opened shape"
        );
        Ok(ShapeDb {
            name: descriptor.name,
            key_serde: descriptor.key_serde,
            value_serde: descriptor.value_serde,
            temporal_index: descriptor.temporal_index,
            fields: descriptor.fields,
            combine: descriptor.combine,
            ctx: ctx.clone(),
            primary,
            recorder,
        })
    }

    /// Shape name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queryable fields.
    pub fn fields(&self) -> &'static [QueryField] {
        self.fields
    }

    /// Slot mapping, for temporal shapes.
    pub fn temporal_index(&self) -> Option<&Arc<dyn TemporalIndex>> {
        self.temporal_index.as_ref()
    }

    /// The shape's environment.
    pub fn env(&self) -> &PlanBEnv {
        &self.ctx.env
    }

    /// Environment directory.
    pub fn path(&self) -> &Path {
        self.ctx.env.path()
    }

    /// Primary database handle.
    pub fn primary(&self) -> Database<Bytes, Bytes> {
        self.primary
    }

    /// Key codec.
    pub fn key_serde(&self) -> &dyn KeySerde<K> {
        self.key_serde.as_ref()
    }

    /// Value codec.
    pub fn value_serde(&self) -> &dyn Serde<V> {
        self.value_serde.as_ref()
    }

    /// Value dictionary.
    pub fn dictionary(&self) -> &HashLookupDb {
        &self.ctx.dictionary
    }

    /// Storage this shape was opened with.
    pub fn context(&self) -> &ShapeContext {
        &self.ctx
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or replace one record in its own transaction.
    pub fn put(&self, key: &K, value: &V) -> Result<()> {
        self.ctx.env.write(|w| self.put_in(w, key, value))
    }

    /// Insert or replace one record within `writer`'s transaction.
    ///
    /// A replaced value's dictionary entry is left for the next sweep.
    pub fn put_in(&self, writer: &mut LmdbWriter<'_>, key: &K, value: &V) -> Result<()> {
        let mut key_buf = Vec::new();
        self.key_serde.write_key(key, &mut key_buf)?;
        let mut value_buf = Vec::new();
        self.value_serde.write(writer, value, &mut value_buf)?;
        writer.put(self.primary, &key_buf, &value_buf)
    }

    /// Insert many records, committing every `max_puts_before_commit` changes.
    ///
    /// Returns the number of records written. On error, batches committed
    /// before the failure stay committed.
    pub fn put_all<'a, I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        let written = self.ctx.env.write(|w| {
            let mut n = 0;
            for (key, value) in records {
                self.put_in(w, key, value)?;
                n += 1;
                w.try_commit()?;
            }
            Ok(n)
        })?;
        debug!(target: "planb::shape", shape = %self.name, written, "Bulk put complete");
        Ok(written)
    }

    /// Delete one record. Returns whether it existed.
    pub fn delete(&self, key: &K) -> Result<bool> {
        self.ctx.env.write(|w| self.delete_in(w, key))
    }

    /// Delete one record within `writer`'s transaction.
    pub fn delete_in(&self, writer: &mut LmdbWriter<'_>, key: &K) -> Result<bool> {
        let mut key_buf = Vec::new();
        match self.key_serde.to_buffer_for_get(key, &mut key_buf)? {
            Some(encoded) => writer.delete(self.primary, encoded),
            None => Ok(false),
        }
    }

    /// Delete every record `expired` selects, then sweep the dictionary.
    ///
    /// Runs in one write transaction. `expired` sees the raw key and value.
    pub fn delete_where(
        &self,
        cancel: &Cancellation,
        mut expired: impl FnMut(&RoTxn<'_>, &[u8], &[u8]) -> Result<bool>,
    ) -> Result<RetentionStats> {
        let stats = self.ctx.env.write(|w| {
            let mut doomed: Vec<Vec<u8>> = Vec::new();
            {
                let txn = w.read_txn()?;
                for item in self.primary.iter(txn)? {
                    cancel.check()?;
                    let (key, value) = item?;
                    if expired(txn, key, value)? {
                        doomed.push(key.to_vec());
                    }
                }
            }
            for key in &doomed {
                w.delete(self.primary, key)?;
            }
            let sweep = self.recorder.delete_unused(&self.live_records(), w, cancel)?;
            Ok(RetentionStats {
                deleted: doomed.len() as u64,
                sweep,
            })
        })?;
        info!(
            target: "planb::shape",
            shape = %self.name,
            deleted = stats.deleted,
            lookups_deleted = stats.sweep.deleted,
            "Retention pass complete"
        );
        Ok(stats)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Decode the value stored under `key`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.ctx.env.read(|txn| self.get_in(txn, key))
    }

    /// Decode the value stored under `key` within `txn`.
    pub fn get_in(&self, txn: &RoTxn<'_>, key: &K) -> Result<Option<V>> {
        let mut key_buf = Vec::new();
        let encoded = match self.key_serde.to_buffer_for_get(key, &mut key_buf)? {
            Some(encoded) => encoded,
            None => return Ok(None),
        };
        match self.primary.get(txn, encoded)? {
            Some(bytes) => Ok(Some(self.value_serde.read(txn, bytes)?)),
            None => Ok(None),
        }
    }

    /// Apply `f` to the raw value stored under `key` without decoding it.
    ///
    /// `f` receives `None` when the key is absent or cannot be encoded.
    pub fn lookup<R>(&self, key: &K, f: impl FnOnce(Option<&[u8]>) -> R) -> Result<R> {
        self.ctx.env.read(|txn| self.key_serde.as_ref().lookup(txn, self.primary, key, f))
    }

    /// Whether a record exists under `key`.
    pub fn contains(&self, key: &K) -> Result<bool> {
        self.lookup(key, |stored| stored.is_some())
    }

    /// Number of primary records.
    pub fn count(&self) -> Result<u64> {
        self.ctx.env.read(|txn| Ok(self.primary.len(txn)?))
    }

    /// Visit every record in key order.
    pub fn scan_in(&self, txn: &RoTxn<'_>, mut f: impl FnMut(K, V) -> Result<()>) -> Result<()> {
        for item in self.primary.iter(txn)? {
            let (key, value) = item?;
            f(self.key_serde.read(txn, key)?, self.value_serde.read(txn, value)?)?;
        }
        Ok(())
    }

    /// Visit every record whose encoded key starts with `prefix`.
    pub fn scan_prefix_in(
        &self,
        txn: &RoTxn<'_>,
        prefix: &[u8],
        mut f: impl FnMut(K, V) -> Result<()>,
    ) -> Result<()> {
        for item in self.primary.prefix_iter(txn, prefix)? {
            let (key, value) = item?;
            f(self.key_serde.read(txn, key)?, self.value_serde.read(txn, value)?)?;
        }
        Ok(())
    }

    /// All records in key order.
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        self.ctx.env.read(|txn| {
            let mut out = Vec::new();
            self.scan_in(txn, |k, v| {
                out.push((k, v));
                Ok(())
            })?;
            Ok(out)
        })
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Copy every record of `source` into this shape.
    ///
    /// Runs in one write transaction on this shape, committing every
    /// `max_puts_before_commit` changes. An incoming record replaces an
    /// existing one with the same key unless the shape combines values.
    /// `source` is left untouched.
    pub fn merge_from(&self, source: &ShapeDb<K, V>) -> Result<MergeStats> {
        let stats = self.ctx.env.write(|w| {
            source.ctx.env.read(|src| {
                let mut stats = MergeStats::default();
                let mut buf = Vec::new();
                for item in source.primary.iter(src)? {
                    let (key, value) = item?;
                    if self.combine.is_none() && !source.value_serde.uses_lookup(value) {
                        w.put(self.primary, key, value)?;
                        stats.copied += 1;
                    } else {
                        let mut incoming = source.value_serde.read(src, value)?;
                        if let Some(combine) = self.combine {
                            let existing = {
                                let txn = w.read_txn()?;
                                match self.primary.get(txn, key)? {
                                    Some(bytes) => Some(self.value_serde.read(txn, bytes)?),
                                    None => None,
                                }
                            };
                            if let Some(existing) = existing {
                                incoming = combine(existing, incoming);
                            }
                        }
                        buf.clear();
                        self.value_serde.write(w, &incoming, &mut buf)?;
                        w.put(self.primary, key, &buf)?;
                        stats.rewritten += 1;
                    }
                    w.try_commit()?;
                }
                Ok(stats)
            })
        })?;
        debug!(
            target: "planb::shape",
            shape = %self.name,
            source = %source.path().display(),
            copied = stats.copied,
            rewritten = stats.rewritten,
            "Merged records"
        );
        Ok(stats)
    }

    /// Merge the shard stored under `source` into this shape, then delete it.
    ///
    /// The shard is opened with this shape's settings and hashing; `describe`
    /// supplies its codecs and must match the ones this shape was opened
    /// with. If the merge fails the shard is kept.
    ///
    /// # Errors
    ///
    /// Returns an I/O `NotFound` error if `source` holds no store, and
    /// [`Error::InvalidConfig`] if it is this shape's own directory.
    pub fn merge(
        &self,
        source: &Path,
        describe: impl FnOnce(&ShapeContext) -> ShapeDescriptor<K, V>,
    ) -> Result<MergeStats> {
        if source == self.path() {
            return Err(Error::InvalidConfig(format!(
                "cannot merge {} into itself",
                source.display()
            )));
        }
        if !source.join("data.mdb").is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no store at {}", source.display()),
            )
            .into());
        }

        let started = Instant::now();
        let source_ctx = self.ctx.sibling(source)?;
        let source_db = ShapeDb::open(&source_ctx, describe(&source_ctx))?;
        let stats = self.merge_from(&source_db)?;
        source_db.close()?;
        drop(source_db);
        drop(source_ctx);
        std::fs::remove_dir_all(source)?;

        info!(
            target: "planb::shape",
            shape = %self.name,
            source = %source.display(),
            records = stats.total(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Merge complete"
        );
        Ok(stats)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    fn live_records(&self) -> [LiveRecords; 1] {
        [LiveRecords {
            db: self.primary,
            part: RecordPart::Value,
        }]
    }

    /// Delete dictionary entries no record references.
    ///
    /// Holds the write transaction for the whole pass, so writers to this
    /// shape wait until it finishes. A cancelled sweep deletes nothing.
    pub fn sweep(&self, cancel: &Cancellation) -> Result<SweepStats> {
        let started = Instant::now();
        let live = self.live_records();
        let result = cancel.check().and_then(|()| {
            self.ctx.env.write(|w| self.recorder.delete_unused(&live, w, cancel))
        });
        match result {
            Ok(stats) => {
                info!(
                    target: "planb::shape",
                    shape = %self.name,
                    scanned = stats.scanned,
                    deleted = stats.deleted,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sweep complete"
                );
                Ok(stats)
            }
            Err(e) => {
                warn!(target: "planb::shape", shape = %self.name, error = %e, "Sweep aborted");
                Err(e)
            }
        }
    }

    /// Record and dictionary counts.
    pub fn info(&self) -> Result<ShapeInfo> {
        let (records, dictionary_entries) = self.ctx.env.read(|txn| {
            Ok((self.primary.len(txn)?, self.ctx.dictionary.len(txn)?))
        })?;
        Ok(ShapeInfo {
            name: self.name.clone(),
            path: self.ctx.env.path().to_path_buf(),
            records,
            dictionary_entries,
            clashes: self.ctx.dictionary.clash_count(),
        })
    }

    /// Close the environment. Later operations return `Error::Closed`.
    pub fn close(&self) -> Result<()> {
        self.ctx.env.close()
    }
}

impl<K, V> std::fmt::Debug for ShapeDb<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeDb")
            .field("name", &self.name)
            .field("env", &self.ctx.env)
            .finish()
    }
}

/// Type-erased maintenance surface of a registered shape.
pub trait ShapeMaintenance: Send + Sync {
    /// Shape name.
    fn name(&self) -> &str;
    /// Queryable fields.
    fn fields(&self) -> &'static [QueryField];
    /// Number of primary records.
    fn count(&self) -> Result<u64>;
    /// Delete unreferenced dictionary entries.
    fn sweep(&self, cancel: &Cancellation) -> Result<SweepStats>;
    /// Record and dictionary counts.
    fn info(&self) -> Result<ShapeInfo>;
    /// Close the environment.
    fn close(&self) -> Result<()>;
}

impl<K, V> ShapeMaintenance for ShapeDb<K, V> {
    fn name(&self) -> &str {
        ShapeDb::name(self)
    }

    fn fields(&self) -> &'static [QueryField] {
        ShapeDb::fields(self)
    }

    fn count(&self) -> Result<u64> {
        ShapeDb::count(self)
    }

    fn sweep(&self, cancel: &Cancellation) -> Result<SweepStats> {
        ShapeDb::sweep(self, cancel)
    }

    fn info(&self) -> Result<ShapeInfo> {
        ShapeDb::info(self)
    }

    fn close(&self) -> Result<()> {
        ShapeDb::close(self)
    }
}

/// A concrete shape wrapping a [`ShapeDb`].
pub trait Shape: Send + Sync + 'static {
    /// Record key type
    type Key: 'static;
    /// Record value type
    type Value: 'static;

    /// The underlying typed store.
    fn db(&self) -> &Arc<ShapeDb<Self::Key, Self::Value>>;
}
