//! Binary codecs for shape keys and values.
//!
//! Every byte a shape stores passes through a [`Serde`] (values) or a
//! [`KeySerde`] (keys). Keys are always stored in full; values are either
//! inline or a tagged reference to the shape's dictionary.
//!
//! # Formats
//!
//! | Codec | Layout |
//! |-------|--------|
//! | [`ValSerde`] | `type tag, payload` |
//! | [`VariableValSerde`] | `0, val` inline or `1, hash` reference |
//! | [`StringKeySerde`] | UTF-8 bytes, at most [`MAX_KEY_LENGTH`] |
//! | [`SessionKeySerde`] | `u16 len, key, start, end` |
//! | [`TemporalKeySerde`] | `u16 len, key, u16 slot` |
//! | [`RangeKeySerde`] | `from, to` |
//! | [`StateValueSerde`] | `insert time, variable val` |
//! | [`InstantSerde`] / [`CountSerde`] | 8 bytes |
//!
//! Times and range bounds use the order-preserving integer encoding from
//! [`reader`], so records sort by them.
//!
//! # Usage
//!
//! ```ignore
//! use planb_storage::codec::{KeySerde, StringKeySerde};
//!
//! let mut buf = Vec::new();
//! StringKeySerde.write_key(&"abc".to_string(), &mut buf)?;
//! assert_eq!(buf, b"abc");
//! ```

pub mod reader;
mod session;
mod state;
mod temporal;
mod time;
mod traits;
mod val;

pub use reader::ByteReader;
pub use session::SessionKeySerde;
pub use state::{RangeKeySerde, StateValueSerde, StringKeySerde};
pub use temporal::{CountSerde, TemporalKeySerde};
pub use time::{InstantSerde, TimeSerde};
pub use traits::{KeySerde, Serde, MAX_KEY_LENGTH};
pub use val::{decode_val, encode_val, ValSerde, VariableValSerde};

use planb_core::Error;

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Buffer ended before a field was complete
    #[error("Truncated buffer: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the field needs
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Bytes left over after the last field
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// A type or reference tag byte is not recognised
    #[error("Unknown tag: {0}")]
    UnknownTag(u8),

    /// Text field is not valid UTF-8
    #[error("Invalid UTF-8 in text field")]
    InvalidUtf8,

    /// Field too long for its length prefix
    #[error("Field of {0} bytes too long to encode")]
    TooLong(usize),

    /// A dictionary reference points at a missing entry
    #[error("Missing dictionary entry {0}")]
    MissingLookup(String),
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Corruption(e.to_string())
    }
}
