//! Session: activity intervals per key
//!
//! A session is a key active over `[start, end]`. Keys encode the session
//! itself, so all sessions of one key sort together by start then end and
//! the value holds only the insert time. Times are stored at the shape's
//! [`TemporalPrecision`]; queries truncate to the same precision.
//!
//! Extending a session replaces its record (delete old key, put new key)
//! inside one write transaction, so readers see either the old or the new
//! interval, never both or neither.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use planb_core::schema::session_fields;
use planb_core::{Cancellation, QueryField, Result, Session, TemporalPrecision, Val};
use planb_storage::codec::{InstantSerde, SessionKeySerde};

use super::date_val;
use crate::shape::{MergeStats, RetentionStats, Shape, ShapeContext, ShapeDb, ShapeDescriptor};

/// Activity intervals per key.
#[derive(Debug, Clone)]
pub struct SessionDb {
    db: Arc<ShapeDb<Session, DateTime<Utc>>>,
    key_serde: SessionKeySerde,
}

impl SessionDb {
    /// Codecs and catalogue for a session shape in `ctx`.
    pub fn descriptor(
        ctx: &ShapeContext,
        precision: TemporalPrecision,
    ) -> ShapeDescriptor<Session, DateTime<Utc>> {
        ShapeDescriptor::new(
            ctx.name(),
            Arc::new(SessionKeySerde::new(precision)),
            Arc::new(InstantSerde),
            session_fields::FIELDS,
        )
    }

    /// Open the session shape of `ctx`.
    pub fn open(ctx: &ShapeContext, precision: TemporalPrecision) -> Result<Self> {
        Ok(SessionDb {
            db: Arc::new(ShapeDb::open(ctx, Self::descriptor(ctx, precision))?),
            key_serde: SessionKeySerde::new(precision),
        })
    }

    /// Precision of stored times.
    pub fn precision(&self) -> TemporalPrecision {
        self.key_serde.precision()
    }

    /// Record `session`, stamped with the current time.
    pub fn insert(&self, session: &Session) -> Result<()> {
        self.insert_at(session, Utc::now())
    }

    /// Record `session` with an explicit insert time.
    pub fn insert_at(&self, session: &Session, insert_time: DateTime<Utc>) -> Result<()> {
        self.db.put(session, &insert_time)
    }

    /// Move the end of `session` to `end` and return the new session.
    ///
    /// If `session` is not stored, the extended session is inserted on its
    /// own; nothing signals the missing original. Use [`SessionDb::delete`]
    /// first when that distinction matters.
    ///
    /// # Errors
    ///
    /// Returns [`planb_core::Error::InvalidSession`] if `end` precedes the
    /// session start.
    pub fn extend(&self, session: &Session, end: DateTime<Utc>) -> Result<Session> {
        let extended = session.with_end(end)?;
        let replaced = self.db.env().write(|w| {
            let replaced = self.db.delete_in(w, session)?;
            self.db.put_in(w, &extended, &Utc::now())?;
            Ok(replaced)
        })?;
        debug!(
            target: "planb::shape",
            shape = self.db.name(),
            key = session.key(),
            replaced,
            "Extended session"
        );
        Ok(extended)
    }

    /// Merge the session shard under `source` into this shape and delete it.
    ///
    /// Sessions are keys, so the result holds the sessions of both.
    pub fn merge(&self, source: &Path) -> Result<MergeStats> {
        let precision = self.precision();
        self.db.merge(source, |ctx| Self::descriptor(ctx, precision))
    }

    /// Remove one session. Returns whether it existed.
    pub fn delete(&self, session: &Session) -> Result<bool> {
        self.db.delete(session)
    }

    fn prefix(&self, key: &str) -> Result<Vec<u8>> {
        let mut prefix = Vec::new();
        self.key_serde.write_prefix(key, &mut prefix)?;
        Ok(prefix)
    }

    /// The session of `key` active at `time`, if any.
    ///
    /// Scans the key's sessions from the latest start backwards.
    pub fn get_state(&self, key: &str, time: DateTime<Utc>) -> Result<Option<Session>> {
        let time = self.precision().truncate(time)?;
        let prefix = self.prefix(key)?;
        let primary = self.db.primary();
        self.db.env().read(|txn| {
            for item in primary.rev_prefix_iter(txn, prefix.as_slice())? {
                let (encoded, _) = item?;
                let session = self.db.key_serde().read(txn, encoded)?;
                if session.contains(time) {
                    return Ok(Some(session));
                }
            }
            Ok(None)
        })
    }

    /// All sessions of `key`, ordered by start.
    pub fn sessions(&self, key: &str) -> Result<Vec<Session>> {
        let prefix = self.prefix(key)?;
        self.db.env().read(|txn| {
            let mut out = Vec::new();
            self.db.scan_prefix_in(txn, &prefix, |session, _| {
                out.push(session);
                Ok(())
            })?;
            Ok(out)
        })
    }

    /// Merge overlapping sessions of each key that start before `before`.
    ///
    /// Merged records keep the latest insert time of their parts. Returns
    /// the number of records removed.
    pub fn condense(&self, before: DateTime<Utc>, cancel: &Cancellation) -> Result<u64> {
        let primary = self.db.primary();
        let removed = self.db.env().write(|w| {
            let mut merges: Vec<Run> = Vec::new();
            {
                let txn = w.read_txn()?;
                let mut run: Option<Run> = None;
                for item in primary.iter(txn)? {
                    cancel.check()?;
                    let (encoded, value) = item?;
                    let session = self.db.key_serde().read(txn, encoded)?;
                    let inserted = self.db.value_serde().read(txn, value)?;
                    if session.start() >= before {
                        Run::flush(run.take(), &mut merges);
                        continue;
                    }
                    run = match run.take() {
                        Some(current) => match current.absorb(session, inserted) {
                            ControlFlow::Continue(grown) => Some(grown),
                            ControlFlow::Break((done, next)) => {
                                Run::flush(Some(done), &mut merges);
                                Some(next)
                            }
                        },
                        None => Some(Run::start(session, inserted)),
                    };
                }
                Run::flush(run, &mut merges);
            }

            let mut removed = 0u64;
            for merge in &merges {
                for part in &merge.parts {
                    self.db.delete_in(w, part)?;
                }
                self.db.put_in(w, &merge.merged, &merge.inserted)?;
                removed += merge.parts.len() as u64 - 1;
            }
            Ok(removed)
        })?;
        info!(
            target: "planb::shape",
            shape = self.db.name(),
            removed,
            "Condensed sessions"
        );
        Ok(removed)
    }

    /// Remove sessions older than `before`, then sweep.
    ///
    /// With `use_state_time` a session is old when it ended before `before`;
    /// otherwise when it was inserted before `before`.
    pub fn delete_old_data(
        &self,
        before: DateTime<Utc>,
        use_state_time: bool,
        cancel: &Cancellation,
    ) -> Result<RetentionStats> {
        self.db.delete_where(cancel, |txn, key, value| {
            if use_state_time {
                Ok(self.db.key_serde().read(txn, key)?.end() < before)
            } else {
                Ok(self.db.value_serde().read(txn, value)? < before)
            }
        })
    }

    /// Value of catalogue `field` for one session.
    pub fn field_value(field: &QueryField, session: &Session) -> Option<Val> {
        match field.name {
            n if n == session_fields::KEY.name => Some(Val::from(session.key())),
            n if n == session_fields::START.name => Some(date_val(session.start())),
            n if n == session_fields::END.name => Some(date_val(session.end())),
            _ => None,
        }
    }
}

impl Shape for SessionDb {
    type Key = Session;
    type Value = DateTime<Utc>;

    fn db(&self) -> &Arc<ShapeDb<Session, DateTime<Utc>>> {
        &self.db
    }
}

/// Consecutive touching sessions of one key.
struct Run {
    parts: Vec<Session>,
    merged: Session,
    inserted: DateTime<Utc>,
}

impl Run {
    fn start(session: Session, inserted: DateTime<Utc>) -> Self {
        Run {
            merged: session.clone(),
            parts: vec![session],
            inserted,
        }
    }

    /// Grow the run with `session`, or close it and start a new one.
    fn absorb(mut self, session: Session, inserted: DateTime<Utc>) -> ControlFlow<(Run, Run), Run> {
        if self.merged.touches(&session, chrono::Duration::zero()) {
            self.merged = self.merged.merge(&session);
            self.inserted = self.inserted.max(inserted);
            self.parts.push(session);
            ControlFlow::Continue(self)
        } else {
            ControlFlow::Break((self, Run::start(session, inserted)))
        }
    }

    fn flush(run: Option<Run>, merges: &mut Vec<Run>) {
        if let Some(run) = run {
            if run.parts.len() > 1 {
                merges.push(run);
            }
        }
    }
}
