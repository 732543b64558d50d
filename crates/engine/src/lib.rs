//! State shapes and store facade for Plan B
//!
//! This crate builds the user-facing layers on top of `planb-storage`:
//! - ShapeDb: typed put/get/lookup/scan/sweep/merge over one shape's environment
//! - shapes: State, Session, TemporalCount and RangedState
//! - PlanBStore: shape registry keyed by name, opened from a data directory
//! - PlanBConfig: `planb.toml` settings
//! - MaintenanceTask: periodic background sweeps
//!
//! Shapes are registered explicitly at startup; there is no global state.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod maintenance;
pub mod shape;
pub mod shapes;
pub mod store;

pub use config::{MaintenanceConfig, PlanBConfig, CONFIG_FILE_NAME};
pub use maintenance::MaintenanceTask;
pub use shape::{
    MergeStats, RetentionStats, Shape, ShapeContext, ShapeDb, ShapeDescriptor, ShapeInfo,
    ShapeMaintenance,
};
pub use shapes::{RangedStateDb, SessionDb, StateDb, TemporalCountDb};
pub use store::PlanBStore;
