//! State: the latest value of each key
//!
//! Records map a UTF-8 key to `(insert time, value)`. Values whose
//! encoding exceeds the inline threshold live in the shape dictionary, so
//! repeated large values are stored once.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use planb_core::schema::state_fields;
use planb_core::{Cancellation, QueryField, Result, StateValue, Val};
use planb_storage::codec::{StateValueSerde, StringKeySerde};

use super::date_val;
use crate::shape::{MergeStats, RetentionStats, Shape, ShapeContext, ShapeDb, ShapeDescriptor};

/// Latest value per key.
#[derive(Debug, Clone)]
pub struct StateDb {
    db: Arc<ShapeDb<String, StateValue>>,
}

impl StateDb {
    /// Codecs and catalogue for a state shape in `ctx`.
    pub fn descriptor(ctx: &ShapeContext) -> ShapeDescriptor<String, StateValue> {
        ShapeDescriptor::new(
            ctx.name(),
            Arc::new(StringKeySerde),
            Arc::new(StateValueSerde::new(ctx.variable_val_serde())),
            state_fields::FIELDS,
        )
    }

    /// Open the state shape of `ctx`.
    pub fn open(ctx: &ShapeContext) -> Result<Self> {
        Ok(StateDb {
            db: Arc::new(ShapeDb::open(ctx, Self::descriptor(ctx))?),
        })
    }

    /// Set `key` to `value`, stamped with the current time.
    pub fn put(&self, key: &str, value: impl Into<Val>) -> Result<()> {
        self.put_at(key, value, Utc::now())
    }

    /// Set `key` to `value` with an explicit insert time.
    pub fn put_at(
        &self,
        key: &str,
        value: impl Into<Val>,
        insert_time: DateTime<Utc>,
    ) -> Result<()> {
        self.db
            .put(&key.to_string(), &StateValue::new(insert_time, value))
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Result<Option<Val>> {
        Ok(self.get_state(key)?.map(|state| state.value))
    }

    /// Current value of `key` with its insert time.
    pub fn get_state(&self, key: &str) -> Result<Option<StateValue>> {
        self.db.get(&key.to_string())
    }

    /// Insert time of `key`, read without resolving the value.
    pub fn insert_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.db
            .lookup(&key.to_string(), |raw| raw.map(StateValueSerde::insert_time))?
            .transpose()
    }

    /// Remove `key`. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.db.delete(&key.to_string())
    }

    /// Merge the state shard under `source` into this shape and delete it.
    ///
    /// Keys present in both keep the shard's value.
    pub fn merge(&self, source: &Path) -> Result<MergeStats> {
        self.db.merge(source, Self::descriptor)
    }

    /// Remove every key last written before `before`, then sweep.
    pub fn delete_old_data(
        &self,
        before: DateTime<Utc>,
        cancel: &Cancellation,
    ) -> Result<RetentionStats> {
        self.db.delete_where(cancel, |_, _, value| {
            Ok(StateValueSerde::insert_time(value)? < before)
        })
    }

    /// Value of catalogue `field` for one record.
    pub fn field_value(field: &QueryField, key: &str, state: &StateValue) -> Option<Val> {
        match field.name {
            n if n == state_fields::KEY.name => Some(Val::from(key)),
            n if n == state_fields::VALUE_TYPE.name => {
                Some(Val::from(state.value.val_type().name()))
            }
            n if n == state_fields::VALUE.name => Some(state.value.clone()),
            n if n == state_fields::INSERT_TIME.name => Some(date_val(state.insert_time)),
            _ => None,
        }
    }
}

impl Shape for StateDb {
    type Key = String;
    type Value = StateValue;

    fn db(&self) -> &Arc<ShapeDb<String, StateValue>> {
        &self.db
    }
}
