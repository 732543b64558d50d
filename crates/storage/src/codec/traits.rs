//! Codec trait definitions.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, RoTxn};

use planb_core::{Error, Result};

use crate::recorder::{NoUsedLookups, UsedLookupsRecorder};
use crate::writer::LmdbWriter;

/// Largest key LMDB accepts with its default page layout.
pub const MAX_KEY_LENGTH: usize = 511;

/// Binary codec between `T` and bytes stored in a shape.
///
/// # Thread Safety
///
/// Codecs are shared by every transaction of a shape and must be
/// `Send + Sync`. They hold no per-call state.
pub trait Serde<T>: Send + Sync {
    /// Encode `value` by appending to `out`.
    ///
    /// May store the value (or part of it) in the shape's dictionary and
    /// record the reference with the writer's mark set.
    fn write(&self, writer: &mut LmdbWriter<'_>, value: &T, out: &mut Vec<u8>) -> Result<()>;

    /// Decode a value, resolving dictionary references through `txn`.
    ///
    /// Truncated or malformed input is an error, never skipped.
    fn read(&self, txn: &RoTxn<'_>, bytes: &[u8]) -> Result<T>;

    /// Whether `bytes` is a reference into the dictionary.
    fn uses_lookup(&self, _bytes: &[u8]) -> bool {
        false
    }

    /// Recorder for the dictionary this codec writes to.
    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        Arc::new(NoUsedLookups)
    }
}

/// A [`Serde`] for primary keys.
///
/// Keys are always stored in full, never hashed, so range and prefix scans
/// over encoded keys stay meaningful.
pub trait KeySerde<T>: Serde<T> {
    /// Encode `key` by appending to `out`.
    fn write_key(&self, key: &T, out: &mut Vec<u8>) -> Result<()>;

    /// Encode `key` for a point lookup.
    ///
    /// Returns `None` when no record can exist under this key (for example a
    /// key longer than [`MAX_KEY_LENGTH`]), which callers treat as "absent".
    fn to_buffer_for_get<'b>(&self, key: &T, out: &'b mut Vec<u8>) -> Result<Option<&'b [u8]>> {
        out.clear();
        match self.write_key(key, out) {
            Ok(()) if out.len() <= MAX_KEY_LENGTH => Ok(Some(out.as_slice())),
            Ok(()) | Err(Error::KeyTooLong { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<'s, T> dyn KeySerde<T> + 's {
    /// Look `key` up in `db` and apply `f` to the raw stored value.
    ///
    /// Lets callers test existence or derive a scalar without decoding the
    /// whole value.
    pub fn lookup<R>(
        &self,
        txn: &RoTxn<'_>,
        db: Database<Bytes, Bytes>,
        key: &T,
        f: impl FnOnce(Option<&[u8]>) -> R,
    ) -> Result<R> {
        let mut buf = Vec::new();
        let stored = match self.to_buffer_for_get(key, &mut buf)? {
            Some(encoded) => db.get(txn, encoded)?,
            None => None,
        };
        Ok(f(stored))
    }
}

/// Check an encoded key against [`MAX_KEY_LENGTH`].
pub(crate) fn check_key_length(len: usize) -> Result<()> {
    if len > MAX_KEY_LENGTH {
        return Err(Error::KeyTooLong {
            len,
            max: MAX_KEY_LENGTH,
        });
    }
    Ok(())
}
