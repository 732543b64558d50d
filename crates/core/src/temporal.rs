//! Temporal bucketing
//!
//! A [`TemporalIndex`] maps an instant plus a time zone onto a slot in a
//! fixed-size cyclic index, e.g. 24 slots for hour-of-day. Counters keyed by
//! `(key, slot)` therefore have a bounded number of cells per key no matter
//! how long they run.
//!
//! [`TemporalPrecision`] controls how finely instants are kept inside
//! encoded keys.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// ZoneId
// ============================================================================

/// An IANA time zone, e.g. `UTC` or `Europe/London`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneId(Tz);

impl ZoneId {
    /// The UTC zone.
    pub const UTC: ZoneId = ZoneId(Tz::UTC);

    /// Resolve a zone from its IANA id.
    pub fn parse(id: &str) -> Result<Self> {
        Tz::from_str(id)
            .map(ZoneId)
            .map_err(|e| Error::InvalidZone(format!("{}: {}", id, e)))
    }

    /// The underlying `chrono-tz` zone.
    pub fn tz(&self) -> Tz {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name())
    }
}

// ============================================================================
// TemporalIndex
// ============================================================================

/// Granularity of the slots of a [`TemporalIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalUnit {
    /// One slot per minute
    Minutes,
    /// One slot per hour
    Hours,
    /// One slot per day
    Days,
    /// One slot per month
    Months,
}

/// Maps `(instant, zone)` to a slot in `[0, entries())`.
///
/// The mapping is a pure function of its inputs and the number of entries is
/// fixed for the lifetime of a shape.
pub trait TemporalIndex: Send + Sync + fmt::Debug {
    /// Number of slots.
    fn entries(&self) -> usize;

    /// Granularity of a slot.
    fn temporal_unit(&self) -> TemporalUnit;

    /// Slot for the instant, evaluated in the zone's local time.
    fn entry_index(&self, instant: DateTime<Utc>, zone: &ZoneId) -> usize;
}

/// 24 slots, one per zone-local hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct HourOfDay;

impl TemporalIndex for HourOfDay {
    fn entries(&self) -> usize {
        24
    }

    fn temporal_unit(&self) -> TemporalUnit {
        TemporalUnit::Hours
    }

    fn entry_index(&self, instant: DateTime<Utc>, zone: &ZoneId) -> usize {
        instant.with_timezone(&zone.tz()).hour() as usize
    }
}

/// 7 slots, Monday is slot 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayOfWeek;

impl TemporalIndex for DayOfWeek {
    fn entries(&self) -> usize {
        7
    }

    fn temporal_unit(&self) -> TemporalUnit {
        TemporalUnit::Days
    }

    fn entry_index(&self, instant: DateTime<Utc>, zone: &ZoneId) -> usize {
        instant
            .with_timezone(&zone.tz())
            .weekday()
            .num_days_from_monday() as usize
    }
}

/// 60 slots, one per minute of the hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinuteOfHour;

impl TemporalIndex for MinuteOfHour {
    fn entries(&self) -> usize {
        60
    }

    fn temporal_unit(&self) -> TemporalUnit {
        TemporalUnit::Minutes
    }

    fn entry_index(&self, instant: DateTime<Utc>, zone: &ZoneId) -> usize {
        instant.with_timezone(&zone.tz()).minute() as usize
    }
}

/// 12 slots, January is slot 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthOfYear;

impl TemporalIndex for MonthOfYear {
    fn entries(&self) -> usize {
        12
    }

    fn temporal_unit(&self) -> TemporalUnit {
        TemporalUnit::Months
    }

    fn entry_index(&self, instant: DateTime<Utc>, zone: &ZoneId) -> usize {
        instant.with_timezone(&zone.tz()).month0() as usize
    }
}

// ============================================================================
// TemporalPrecision
// ============================================================================

/// Resolution at which instants are stored in keys.
///
/// Coarser precisions truncate towards negative infinity, so two instants
/// inside the same unit encode identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalPrecision {
    /// Days since epoch
    Day,
    /// Hours since epoch
    Hour,
    /// Minutes since epoch
    Minute,
    /// Seconds since epoch
    Second,
    /// Milliseconds since epoch
    #[default]
    Millisecond,
    /// Nanoseconds since epoch (limited to years 1677..2262)
    Nanosecond,
}

impl TemporalPrecision {
    fn unit_seconds(&self) -> Option<i64> {
        match self {
            TemporalPrecision::Day => Some(86_400),
            TemporalPrecision::Hour => Some(3_600),
            TemporalPrecision::Minute => Some(60),
            TemporalPrecision::Second => Some(1),
            _ => None,
        }
    }

    /// Instant as a count of this precision's units since the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] for nanosecond precision outside
    /// roughly 1677 to 2262.
    pub fn to_units(&self, instant: DateTime<Utc>) -> Result<i64> {
        match self {
            TemporalPrecision::Millisecond => Ok(instant.timestamp_millis()),
            TemporalPrecision::Nanosecond => instant.timestamp_nanos_opt().ok_or_else(|| {
                Error::OutOfRange(format!("{} out of nanosecond range", instant))
            }),
            coarse => {
                let unit = coarse.unit_seconds().unwrap_or(1);
                Ok(instant.timestamp().div_euclid(unit))
            }
        }
    }

    /// Inverse of [`TemporalPrecision::to_units`].
    pub fn from_units(&self, units: i64) -> Result<DateTime<Utc>> {
        let out_of_range = || Error::corruption(format!("time value {} out of range", units));
        match self {
            TemporalPrecision::Millisecond => {
                DateTime::from_timestamp_millis(units).ok_or_else(out_of_range)
            }
            TemporalPrecision::Nanosecond => Ok(DateTime::from_timestamp_nanos(units)),
            coarse => {
                let unit = coarse.unit_seconds().unwrap_or(1);
                let secs = units.checked_mul(unit).ok_or_else(out_of_range)?;
                DateTime::from_timestamp(secs, 0).ok_or_else(out_of_range)
            }
        }
    }

    /// Drop everything finer than this precision.
    pub fn truncate(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.from_units(self.to_units(instant)?)
    }
}
