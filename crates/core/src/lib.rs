//! Core types for the Plan B state store
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: Error type hierarchy
//! - Val: Dynamically typed state values
//! - Hash / HashFactory: Fixed-width content hashes for dictionary keys
//! - TemporalIndex / ZoneId / TemporalPrecision: Time bucketing
//! - Session / TemporalKey / KeyRange / StateValue: Shape records
//! - QueryField: Per-shape field catalogues
//! - Cancellation: Caller-supplied cancel signal for long scans

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod hash;
pub mod schema;
pub mod temporal;
pub mod types;
pub mod value;

pub use cancel::Cancellation;
pub use error::{Error, Result};
pub use hash::{hash_factory, Hash, HashFactory, HashLength, IntegerHashFactory, LongHashFactory};
pub use schema::{find_field, FieldType, QueryField};
pub use temporal::{
    DayOfWeek, HourOfDay, MinuteOfHour, MonthOfYear, TemporalIndex, TemporalPrecision,
    TemporalUnit, ZoneId,
};
pub use types::{KeyRange, Session, StateValue, TemporalKey};
pub use value::{Val, ValType};
