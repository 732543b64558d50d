//! RangedState: values valid over an inclusive integer key range
//!
//! Keys are `[from, to]` pairs sorted by `from`. A point query seeks to the
//! last range starting at or before the point and walks backwards until a
//! range reaches far enough. When ranges overlap, the containing range with
//! the greatest start wins, so a nested range shadows its enclosing one.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use planb_core::schema::range_fields;
use planb_core::{Cancellation, KeyRange, QueryField, Result, Val};
use planb_storage::codec::RangeKeySerde;

use crate::shape::{MergeStats, RetentionStats, Shape, ShapeContext, ShapeDb, ShapeDescriptor};

/// Values keyed by integer ranges.
#[derive(Debug, Clone)]
pub struct RangedStateDb {
    db: Arc<ShapeDb<KeyRange, Val>>,
}

impl RangedStateDb {
    /// Codecs and catalogue for a ranged shape in `ctx`.
    pub fn descriptor(ctx: &ShapeContext) -> ShapeDescriptor<KeyRange, Val> {
        ShapeDescriptor::new(
            ctx.name(),
            Arc::new(RangeKeySerde),
            ctx.variable_val_serde(),
            range_fields::FIELDS,
        )
    }

    /// Open the ranged shape of `ctx`.
    pub fn open(ctx: &ShapeContext) -> Result<Self> {
        Ok(RangedStateDb {
            db: Arc::new(ShapeDb::open(ctx, Self::descriptor(ctx))?),
        })
    }

    /// Set the value of `range`.
    pub fn put(&self, range: &KeyRange, value: impl Into<Val>) -> Result<()> {
        self.db.put(range, &value.into())
    }

    /// Value stored for exactly `range`.
    pub fn get(&self, range: &KeyRange) -> Result<Option<Val>> {
        self.db.get(range)
    }

    /// The range containing `n` and its value.
    ///
    /// Of several containing ranges, returns the one with the greatest
    /// start. Walks back over every range starting at or before `n` when
    /// none contains it.
    pub fn get_state(&self, n: i64) -> Result<Option<(KeyRange, Val)>> {
        let upper = RangeKeySerde::seek_upper(n);
        let bounds: (Bound<&[u8]>, Bound<&[u8]>) =
            (Bound::Unbounded, Bound::Included(upper.as_slice()));
        let primary = self.db.primary();
        self.db.env().read(|txn| {
            for item in primary.rev_range(txn, &bounds)? {
                let (encoded, value) = item?;
                let range = self.db.key_serde().read(txn, encoded)?;
                if range.contains(n) {
                    return Ok(Some((range, self.db.value_serde().read(txn, value)?)));
                }
            }
            Ok(None)
        })
    }

    /// Remove `range`. Returns whether it existed.
    pub fn delete(&self, range: &KeyRange) -> Result<bool> {
        self.db.delete(range)
    }

    /// Merge the ranged shard under `source` into this shape and delete it.
    pub fn merge(&self, source: &Path) -> Result<MergeStats> {
        self.db.merge(source, Self::descriptor)
    }

    /// Remove every range ending below `n`, then sweep.
    pub fn delete_below(&self, n: i64, cancel: &Cancellation) -> Result<RetentionStats> {
        self.db.delete_where(cancel, |txn, key, _| {
            Ok(self.db.key_serde().read(txn, key)?.to() < n)
        })
    }

    /// Value of catalogue `field` for one record.
    pub fn field_value(field: &QueryField, range: &KeyRange, value: &Val) -> Option<Val> {
        match field.name {
            n if n == range_fields::KEY_START.name => Some(Val::Long(range.from())),
            n if n == range_fields::KEY_END.name => Some(Val::Long(range.to())),
            n if n == range_fields::VALUE_TYPE.name => Some(Val::from(value.val_type().name())),
            n if n == range_fields::VALUE.name => Some(value.clone()),
            _ => None,
        }
    }
}

impl Shape for RangedStateDb {
    type Key = KeyRange;
    type Value = Val;

    fn db(&self) -> &Arc<ShapeDb<KeyRange, Val>> {
        &self.db
    }
}
