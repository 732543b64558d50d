//! Record types held by the built-in state shapes
//!
//! - [`Session`]: a keyed time window, `start <= end`
//! - [`TemporalKey`]: a key plus a temporal slot
//! - [`KeyRange`]: an inclusive integer range used as a key
//! - [`StateValue`]: a value stamped with its insert time

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::value::Val;

/// A keyed session window.
///
/// Constructed only through [`Session::new`], which rejects `start > end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    key: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Session {
    /// Create a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if `start` is after `end`.
    pub fn new(key: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidSession { start, end });
        }
        Ok(Session {
            key: key.into(),
            start,
            end,
        })
    }

    /// A zero-length session at `instant`.
    pub fn at(key: impl Into<String>, instant: DateTime<Utc>) -> Self {
        Session {
            key: key.into(),
            start: instant,
            end: instant,
        }
    }

    /// Session key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Session start.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Session end.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `instant` lies within `[start, end]`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// The same session with a new end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if `end` is before the start.
    pub fn with_end(&self, end: DateTime<Utc>) -> Result<Self> {
        Session::new(self.key.clone(), self.start, end)
    }

    /// Whether `other` overlaps this session or starts within `gap` of its end.
    pub fn touches(&self, other: &Session, gap: Duration) -> bool {
        self.key == other.key && other.start <= self.end + gap && self.start <= other.end + gap
    }

    /// Smallest session covering both.
    pub fn merge(&self, other: &Session) -> Session {
        Session {
            key: self.key.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A key bucketed into one slot of a temporal index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemporalKey {
    /// Counter key
    pub key: String,
    /// Slot from the shape's temporal index
    pub slot: u16,
}

impl TemporalKey {
    /// Create a temporal key.
    pub fn new(key: impl Into<String>, slot: u16) -> Self {
        TemporalKey {
            key: key.into(),
            slot,
        }
    }
}

/// Inclusive integer range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyRange {
    from: i64,
    to: i64,
}

impl KeyRange {
    /// Create a range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRange`] if `from > to`.
    pub fn new(from: i64, to: i64) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidRange { from, to });
        }
        Ok(KeyRange { from, to })
    }

    /// Lower bound.
    pub fn from(&self) -> i64 {
        self.from
    }

    /// Upper bound.
    pub fn to(&self) -> i64 {
        self.to
    }

    /// Whether `n` lies within the range.
    pub fn contains(&self, n: i64) -> bool {
        self.from <= n && n <= self.to
    }
}

/// A value with the time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct StateValue {
    /// When the value was written; drives retention
    pub insert_time: DateTime<Utc>,
    /// The value itself
    pub value: Val,
}

impl StateValue {
    /// Stamp `value` with `insert_time`.
    pub fn new(insert_time: DateTime<Utc>, value: impl Into<Val>) -> Self {
        StateValue {
            insert_time,
            value: value.into(),
        }
    }
}
