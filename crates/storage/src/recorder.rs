//! Used-lookup recording and dictionary sweeping
//!
//! Dictionary entries carry no reference counts. Instead:
//!
//! - writes mark each hash they reference in the writer's mark set
//!   ([`UsedLookupsRecorder::record_used`]), and
//! - a sweep ([`UsedLookupsRecorder::delete_unused`]) re-derives the full
//!   set of live references by scanning every primary record, then deletes
//!   every dictionary entry outside that set.
//!
//! The sweep runs inside one exclusive write transaction: marking reads
//! through the writer's own view, so no concurrent writer can add a
//! reference between mark and delete. Nothing is deleted until the mark
//! phase has enumerated every live record; cancellation or a read failure
//! aborts the transaction with the dictionary untouched.

use std::sync::Arc;

use heed::types::Bytes;
use heed::Database;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use planb_core::{Cancellation, Result};

use crate::dictionary::HashLookupDb;
use crate::writer::{HashKey, LmdbWriter};

/// Which half of a primary record may hold dictionary references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPart {
    /// The encoded key
    Key,
    /// The encoded value
    Value,
}

/// A primary store whose records must be scanned during marking.
#[derive(Debug, Clone, Copy)]
pub struct LiveRecords {
    /// Primary database
    pub db: Database<Bytes, Bytes>,
    /// Part of each record holding references
    pub part: RecordPart,
}

/// Counters reported by a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Primary records scanned during marking
    pub scanned: u64,
    /// Distinct hashes found to be in use
    pub marked: u64,
    /// Dictionary entries examined
    pub entries: u64,
    /// Dictionary entries deleted
    pub deleted: u64,
}

/// Tracks and reclaims dictionary references for one shape.
pub trait UsedLookupsRecorder: Send + Sync {
    /// Mark `hash` as referenced by the current write transaction.
    ///
    /// Idempotent within one transaction.
    fn record_used(&self, writer: &mut LmdbWriter<'_>, hash: &[u8]);

    /// Delete every dictionary entry not referenced by a record of `live`.
    fn delete_unused(
        &self,
        live: &[LiveRecords],
        writer: &mut LmdbWriter<'_>,
        cancel: &Cancellation,
    ) -> Result<SweepStats>;
}

/// Recorder for shapes that never reference a dictionary.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUsedLookups;

impl UsedLookupsRecorder for NoUsedLookups {
    fn record_used(&self, _writer: &mut LmdbWriter<'_>, _hash: &[u8]) {}

    fn delete_unused(
        &self,
        _live: &[LiveRecords],
        _writer: &mut LmdbWriter<'_>,
        _cancel: &Cancellation,
    ) -> Result<SweepStats> {
        Ok(SweepStats::default())
    }
}

/// Where a dictionary reference sits inside an encoded record.
///
/// A reference is the byte [`RefLocator::LOOKUP_TAG`] at `offset` followed
/// by `hash_length` hash bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefLocator {
    offset: usize,
    hash_length: usize,
}

impl RefLocator {
    /// Tag byte introducing an inline value.
    pub const INLINE_TAG: u8 = 0;
    /// Tag byte introducing a dictionary reference.
    pub const LOOKUP_TAG: u8 = 1;

    /// Locator for references starting at `offset`.
    pub fn new(offset: usize, hash_length: usize) -> Self {
        RefLocator {
            offset,
            hash_length,
        }
    }

    /// The same layout shifted right by `n` bytes.
    pub fn shifted(&self, n: usize) -> Self {
        RefLocator::new(self.offset + n, self.hash_length)
    }

    /// The referenced hash, if `encoded` holds a reference.
    pub fn locate<'a>(&self, encoded: &'a [u8]) -> Option<&'a [u8]> {
        match encoded.get(self.offset) {
            Some(&tag) if tag == Self::LOOKUP_TAG => {
                encoded.get(self.offset + 1..self.offset + 1 + self.hash_length)
            }
            _ => None,
        }
    }
}

/// Recorder bound to one dictionary.
pub struct DictionaryRecorder {
    lookup: Arc<HashLookupDb>,
    locator: RefLocator,
}

impl DictionaryRecorder {
    /// Recorder for `lookup`, finding references with `locator`.
    pub fn new(lookup: Arc<HashLookupDb>, locator: RefLocator) -> Self {
        DictionaryRecorder { lookup, locator }
    }

    fn mark(
        &self,
        live: &[LiveRecords],
        writer: &mut LmdbWriter<'_>,
        cancel: &Cancellation,
        stats: &mut SweepStats,
    ) -> Result<FxHashSet<HashKey>> {
        let mut used: FxHashSet<HashKey> = writer.marked(self.lookup.name()).cloned().collect();
        let txn = writer.read_txn()?;
        for records in live {
            for item in records.db.iter(txn)? {
                cancel.check()?;
                let (key, value) = item?;
                let encoded = match records.part {
                    RecordPart::Key => key,
                    RecordPart::Value => value,
                };
                if let Some(hash) = self.locator.locate(encoded) {
                    if !used.contains(hash) {
                        used.insert(HashKey::from_slice(hash));
                    }
                }
                stats.scanned += 1;
            }
        }
        stats.marked = used.len() as u64;
        Ok(used)
    }
}

impl UsedLookupsRecorder for DictionaryRecorder {
    fn record_used(&self, writer: &mut LmdbWriter<'_>, hash: &[u8]) {
        writer.mark_used(self.lookup.name(), hash);
    }

    fn delete_unused(
        &self,
        live: &[LiveRecords],
        writer: &mut LmdbWriter<'_>,
        cancel: &Cancellation,
    ) -> Result<SweepStats> {
        cancel.check()?;
        let mut stats = SweepStats::default();
        let used = self.mark(live, writer, cancel, &mut stats)?;

        let mut unused: Vec<HashKey> = Vec::new();
        {
            let txn = writer.read_txn()?;
            self.lookup.for_each_hash(txn, |hash| {
                cancel.check()?;
                stats.entries += 1;
                if !used.contains(hash) {
                    unused.push(HashKey::from_slice(hash));
                }
                Ok(())
            })?;
        }
        debug!(
            target: "planb::sweep",
            dictionary = self.lookup.name(),
            scanned = stats.scanned,
            marked = stats.marked,
            unused = unused.len(),
            "Mark phase complete"
        );

        for hash in &unused {
            if self.lookup.delete(writer, hash)? {
                stats.deleted += 1;
            }
        }
        info!(
            target: "planb::sweep",
            dictionary = self.lookup.name(),
            entries = stats.entries,
            deleted = stats.deleted,
            "Deleted unused dictionary entries"
        );
        Ok(stats)
    }
}
