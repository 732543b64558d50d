//! TemporalCount: counters bucketed by a temporal index
//!
//! Each increment maps its instant to a slot of the shape's
//! [`TemporalIndex`] in the configured zone, then adds to the counter at
//! `(key, slot)`. The index is cyclic: the same hour on different dates
//! lands in the same slot and accumulates.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use planb_core::schema::count_fields;
use planb_core::{Error, QueryField, Result, TemporalIndex, TemporalKey, Val, ZoneId};
use planb_storage::codec::{CountSerde, TemporalKeySerde};
use planb_storage::KeySerde;

use crate::shape::{MergeStats, Shape, ShapeContext, ShapeDb, ShapeDescriptor};

/// Counters per key and temporal slot.
#[derive(Debug, Clone)]
pub struct TemporalCountDb {
    db: Arc<ShapeDb<TemporalKey, i64>>,
    index: Arc<dyn TemporalIndex>,
    zone: ZoneId,
}

impl TemporalCountDb {
    /// Codecs and catalogue for a counter shape in `ctx`.
    pub fn descriptor(
        ctx: &ShapeContext,
        index: Arc<dyn TemporalIndex>,
    ) -> ShapeDescriptor<TemporalKey, i64> {
        ShapeDescriptor::new(
            ctx.name(),
            Arc::new(TemporalKeySerde),
            Arc::new(CountSerde),
            count_fields::FIELDS,
        )
        .with_temporal_index(index)
        .with_combine(i64::saturating_add)
    }

    /// Reject indexes whose slots do not fit the two-byte slot field.
    pub fn check_index(index: &dyn TemporalIndex) -> Result<()> {
        let max = usize::from(u16::MAX) + 1;
        if index.entries() > max {
            return Err(Error::InvalidConfig(format!(
                "temporal index has {} entries, at most {} are supported",
                index.entries(),
                max
            )));
        }
        Ok(())
    }

    /// Open the counter shape of `ctx`, bucketing in `zone`.
    pub fn open(ctx: &ShapeContext, index: Arc<dyn TemporalIndex>, zone: ZoneId) -> Result<Self> {
        Self::check_index(index.as_ref())?;
        let db = ShapeDb::open(ctx, Self::descriptor(ctx, Arc::clone(&index)))?;
        Ok(TemporalCountDb {
            db: Arc::new(db),
            index,
            zone,
        })
    }

    /// The slot mapping.
    pub fn index(&self) -> &dyn TemporalIndex {
        self.index.as_ref()
    }

    /// Default zone for increments.
    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }

    /// Slot of `instant` in `zone`.
    pub fn slot(&self, instant: DateTime<Utc>, zone: &ZoneId) -> u16 {
        // open() bounds entries() to the u16 range
        self.index.entry_index(instant, zone) as u16
    }

    /// Add `delta` to the counter of `key` at `instant`. Returns the new count.
    pub fn increment(&self, key: &str, instant: DateTime<Utc>, delta: i64) -> Result<i64> {
        self.increment_in_zone(key, instant, &self.zone, delta)
    }

    /// Add `delta` to the counter of `key` at `instant`, bucketing in `zone`.
    ///
    /// Read and write happen in one transaction, so concurrent increments
    /// never lose updates. Counts saturate at the `i64` bounds.
    pub fn increment_in_zone(
        &self,
        key: &str,
        instant: DateTime<Utc>,
        zone: &ZoneId,
        delta: i64,
    ) -> Result<i64> {
        let temporal_key = TemporalKey::new(key, self.slot(instant, zone));
        let mut encoded = Vec::new();
        TemporalKeySerde.write_key(&temporal_key, &mut encoded)?;
        let primary = self.db.primary();
        let count = self.db.env().write(|w| {
            let current = match w.get(primary, &encoded)? {
                Some(bytes) => CountSerde::decode(bytes)?,
                None => 0,
            };
            let next = current.saturating_add(delta);
            w.put(primary, &encoded, &next.to_be_bytes())?;
            Ok(next)
        })?;
        trace!(
            target: "planb::shape",
            shape = self.db.name(),
            key,
            slot = temporal_key.slot,
            count,
            "Incremented counter"
        );
        Ok(count)
    }

    /// Counter of `key` at `slot`.
    pub fn get(&self, key: &str, slot: u16) -> Result<Option<i64>> {
        self.db.get(&TemporalKey::new(key, slot))
    }

    /// Counter of `key` in the slot of `instant`, zero if never incremented.
    pub fn count_at(&self, key: &str, instant: DateTime<Utc>) -> Result<i64> {
        Ok(self.get(key, self.slot(instant, &self.zone))?.unwrap_or(0))
    }

    /// Non-empty slots of `key` and their counts, ordered by slot.
    pub fn counts(&self, key: &str) -> Result<Vec<(u16, i64)>> {
        let mut prefix = Vec::new();
        TemporalKeySerde.write_prefix(key, &mut prefix)?;
        self.db.env().read(|txn| {
            let mut out = Vec::new();
            self.db.scan_prefix_in(txn, &prefix, |k, count| {
                out.push((k.slot, count));
                Ok(())
            })?;
            Ok(out)
        })
    }

    /// Merge the counter shard under `source` into this shape and delete it.
    ///
    /// Counters present in both are added, saturating like increments.
    pub fn merge(&self, source: &Path) -> Result<MergeStats> {
        let index = Arc::clone(&self.index);
        self.db.merge(source, move |ctx| Self::descriptor(ctx, index))
    }

    /// Value of catalogue `field` for one counter.
    pub fn field_value(field: &QueryField, key: &TemporalKey, count: i64) -> Option<Val> {
        match field.name {
            n if n == count_fields::KEY.name => Some(Val::from(key.key.as_str())),
            n if n == count_fields::SLOT.name => Some(Val::Long(i64::from(key.slot))),
            n if n == count_fields::COUNT.name => Some(Val::Long(count)),
            _ => None,
        }
    }
}

impl Shape for TemporalCountDb {
    type Key = TemporalKey;
    type Value = i64;

    fn db(&self) -> &Arc<ShapeDb<TemporalKey, i64>> {
        &self.db
    }
}
