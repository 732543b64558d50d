//! Storage layer for the Plan B state store
//!
//! This crate implements the layers built on top of LMDB (via `heed`):
//! - PlanBEnv: one memory-mapped environment per shape, opened on first use
//! - LmdbWriter: write transaction sequencing, batching and the mark set
//! - HashLookupDb: content-addressed dictionary with clash detection
//! - UsedLookupsRecorder: reference marking and the mark-and-sweep pass
//! - codec: Serde / KeySerde traits and the built-in codecs

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod dictionary;
pub mod env;
pub mod recorder;
pub mod writer;

pub use codec::{KeySerde, Serde, MAX_KEY_LENGTH};
pub use dictionary::{HashLookupDb, LookupPut};
pub use env::{EnvInfo, EnvSettings, PlanBEnv, DICTIONARY_DB, PRIMARY_DB};
pub use recorder::{
    DictionaryRecorder, LiveRecords, NoUsedLookups, RecordPart, RefLocator, SweepStats,
    UsedLookupsRecorder,
};
pub use writer::{HashKey, LmdbWriter};

// Re-exported so downstream crates name the same heed types.
pub use heed;
