//! Concrete state shapes
//!
//! Each shape is a thin facade over a [`ShapeDb`](crate::shape::ShapeDb)
//! with its own codecs and field catalogue:
//! - **StateDb**: latest value per string key, with insert time
//! - **SessionDb**: `[start, end]` activity intervals per key
//! - **TemporalCountDb**: counters bucketed by a temporal index
//! - **RangedStateDb**: values valid over an inclusive integer key range
//!
//! ## Field values
//!
//! Every shape exposes `field_value(field, record)` mapping a catalogue
//! field to a [`Val`](planb_core::Val), so a query layer can filter and
//! project without knowing the binary layout.

pub mod count;
pub mod range;
pub mod session;
pub mod state;

pub use count::TemporalCountDb;
pub use range::RangedStateDb;
pub use session::SessionDb;
pub use state::StateDb;

use chrono::{DateTime, Utc};
use planb_core::Val;

fn date_val(instant: DateTime<Utc>) -> Val {
    Val::Date(instant.timestamp_millis())
}
