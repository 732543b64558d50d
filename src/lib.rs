//! Plan B - embedded LMDB-backed state store
//!
//! Plan B keeps the state of stream-processing pipelines in shapes: typed
//! key/value stores with one memory-mapped environment each. Large values
//! are deduplicated through a per-shape dictionary that is reclaimed by
//! mark-and-sweep.
//!
//! # Quick Start
//!
//! ```ignore
//! use planb::{PlanBStore, Session, TemporalPrecision};
//!
//! let store = PlanBStore::open("/var/lib/planb")?;
//! let sessions = store.register_session("logins", TemporalPrecision::Second)?;
//!
//! let session = Session::at("alice", now);
//! sessions.insert(&session)?;
//! sessions.extend(&session, now + chrono::Duration::minutes(5))?;
//! assert!(sessions.get_state("alice", now)?.is_some());
//! ```
//!
//! # Crates
//!
//! - `planb-core`: values, hashes, temporal indexes, records, errors
//! - `planb-storage`: environments, writers, dictionary, codecs, sweeping
//! - `planb-engine`: shapes, the store registry, config and maintenance

pub use planb_core::schema;
pub use planb_core::{
    find_field, hash_factory, Cancellation, DayOfWeek, Error, FieldType, Hash, HashFactory,
    HashLength, HourOfDay, IntegerHashFactory, KeyRange, LongHashFactory, MinuteOfHour,
    MonthOfYear, QueryField, Result, Session, StateValue, TemporalIndex, TemporalKey,
    TemporalPrecision, TemporalUnit, Val, ValType, ZoneId,
};
pub use planb_engine::{
    MaintenanceConfig, MaintenanceTask, MergeStats, PlanBConfig, RangedStateDb, RetentionStats,
    SessionDb, Shape, ShapeContext, ShapeDb, ShapeDescriptor, ShapeInfo, StateDb,
    TemporalCountDb, PlanBStore,
};
pub use planb_storage::codec;
pub use planb_storage::{
    EnvInfo, EnvSettings, HashLookupDb, KeySerde, LmdbWriter, LookupPut, PlanBEnv, Serde,
    SweepStats, UsedLookupsRecorder, DICTIONARY_DB, PRIMARY_DB,
};
