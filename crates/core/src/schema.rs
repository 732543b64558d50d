//! Query field catalogues
//!
//! Each shape publishes the fields an external query layer may filter and
//! project on. The catalogue hides the binary layout: callers get field
//! values through the owning shape's `field_value`.

use serde::Serialize;

/// Type of a queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text
    Text,
    /// An instant
    Date,
    /// A signed integer
    Long,
    /// Name of a value type
    ValueType,
    /// A dynamically typed value
    Value,
}

/// One queryable field of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QueryField {
    /// Field name as seen by the query layer
    pub name: &'static str,
    /// Field type
    pub field_type: FieldType,
    /// Whether the field can appear in predicates (and not only projections)
    pub queryable: bool,
}

impl QueryField {
    const fn new(name: &'static str, field_type: FieldType, queryable: bool) -> Self {
        QueryField {
            name,
            field_type,
            queryable,
        }
    }
}

/// Fields of the Session shape.
pub mod session_fields {
    use super::{FieldType, QueryField};

    /// Session key
    pub const KEY: QueryField = QueryField::new("Key", FieldType::Text, true);
    /// Session start
    pub const START: QueryField = QueryField::new("Start", FieldType::Date, true);
    /// Session end
    pub const END: QueryField = QueryField::new("End", FieldType::Date, true);

    /// All session fields in display order.
    pub const FIELDS: &[QueryField] = &[KEY, START, END];
}

/// Fields of the State shape.
pub mod state_fields {
    use super::{FieldType, QueryField};

    /// State key
    pub const KEY: QueryField = QueryField::new("Key", FieldType::Text, true);
    /// Type of the stored value
    pub const VALUE_TYPE: QueryField = QueryField::new("ValueType", FieldType::ValueType, false);
    /// Stored value
    pub const VALUE: QueryField = QueryField::new("Value", FieldType::Value, false);
    /// When the value was written
    pub const INSERT_TIME: QueryField = QueryField::new("InsertTime", FieldType::Date, true);

    /// All state fields in display order.
    pub const FIELDS: &[QueryField] = &[KEY, VALUE_TYPE, VALUE, INSERT_TIME];
}

/// Fields of the TemporalCount shape.
pub mod count_fields {
    use super::{FieldType, QueryField};

    /// Counter key
    pub const KEY: QueryField = QueryField::new("Key", FieldType::Text, true);
    /// Temporal slot
    pub const SLOT: QueryField = QueryField::new("Slot", FieldType::Long, true);
    /// Accumulated count
    pub const COUNT: QueryField = QueryField::new("Count", FieldType::Long, true);

    /// All count fields in display order.
    pub const FIELDS: &[QueryField] = &[KEY, SLOT, COUNT];
}

/// Fields of the RangedState shape.
pub mod range_fields {
    use super::{FieldType, QueryField};

    /// Inclusive lower bound
    pub const KEY_START: QueryField = QueryField::new("KeyStart", FieldType::Long, true);
    /// Inclusive upper bound
    pub const KEY_END: QueryField = QueryField::new("KeyEnd", FieldType::Long, true);
    /// Type of the stored value
    pub const VALUE_TYPE: QueryField = QueryField::new("ValueType", FieldType::ValueType, false);
    /// Stored value
    pub const VALUE: QueryField = QueryField::new("Value", FieldType::Value, false);

    /// All ranged state fields in display order.
    pub const FIELDS: &[QueryField] = &[KEY_START, KEY_END, VALUE_TYPE, VALUE];
}

/// Find a field by name, case-insensitively.
pub fn find_field(fields: &[QueryField], name: &str) -> Option<QueryField> {
    fields
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
        .copied()
}
