//! Fixed-width content hashing for dictionary keys
//!
//! Large or repeated values are shortened to a [`Hash`] of their encoded
//! bytes and stored once in a shape's dictionary. Two widths exist:
//!
//! - [`HashLength::Long`]: full 64-bit xxh3 digest, 8 bytes on disk (default)
//! - [`HashLength::Integer`]: xxh3 folded to 32 bits, 4 bytes on disk
//!
//! The digest is not cryptographic. Collisions are detected by the
//! dictionary, which keeps the full payload next to the hash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};

/// Width of the hashes produced by a [`HashFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashLength {
    /// 4-byte hashes
    Integer,
    /// 8-byte hashes
    #[default]
    Long,
}

impl HashLength {
    /// Number of bytes a hash of this width occupies on disk.
    pub const fn bytes(&self) -> usize {
        match self {
            HashLength::Integer => 4,
            HashLength::Long => 8,
        }
    }
}

/// A content digest of fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash {
    digest: u64,
    length: HashLength,
}

impl Hash {
    /// Rebuild a hash from its on-disk bytes.
    ///
    /// The slice must be exactly 4 or 8 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            4 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(bytes);
                Ok(Hash {
                    digest: u32::from_be_bytes(b) as u64,
                    length: HashLength::Integer,
                })
            }
            8 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(bytes);
                Ok(Hash {
                    digest: u64::from_be_bytes(b),
                    length: HashLength::Long,
                })
            }
            n => Err(Error::corruption(format!("invalid hash length {}", n))),
        }
    }

    /// Append the big-endian digest to `buf`.
    ///
    /// Always writes exactly [`Hash::len`] bytes.
    pub fn write(&self, buf: &mut Vec<u8>) {
        match self.length {
            HashLength::Integer => buf.extend_from_slice(&(self.digest as u32).to_be_bytes()),
            HashLength::Long => buf.extend_from_slice(&self.digest.to_be_bytes()),
        }
    }

    /// The on-disk bytes as an owned vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        self.write(&mut buf);
        buf
    }

    /// Number of bytes [`Hash::write`] emits.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.length.bytes()
    }

    /// The raw digest value.
    pub fn digest(&self) -> u64 {
        self.digest
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digest)
    }
}

/// Produces fixed-width hashes of byte sequences.
///
/// Implementations must be deterministic: equal input bytes always give an
/// equal [`Hash`], and every hash has exactly [`HashFactory::hash_length`]
/// bytes.
pub trait HashFactory: Send + Sync {
    /// Hash the given bytes.
    fn create(&self, bytes: &[u8]) -> Hash;

    /// Width in bytes of every hash this factory creates.
    fn hash_length(&self) -> usize;
}

/// 64-bit xxh3 hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongHashFactory;

impl HashFactory for LongHashFactory {
    fn create(&self, bytes: &[u8]) -> Hash {
        Hash {
            digest: xxh3_64(bytes),
            length: HashLength::Long,
        }
    }

    fn hash_length(&self) -> usize {
        HashLength::Long.bytes()
    }
}

/// 32-bit hashes made by folding the 64-bit xxh3 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerHashFactory;

impl HashFactory for IntegerHashFactory {
    fn create(&self, bytes: &[u8]) -> Hash {
        let h = xxh3_64(bytes);
        Hash {
            digest: ((h ^ (h >> 32)) as u32) as u64,
            length: HashLength::Integer,
        }
    }

    fn hash_length(&self) -> usize {
        HashLength::Integer.bytes()
    }
}

/// Factory for the requested hash width.
pub fn hash_factory(length: HashLength) -> Arc<dyn HashFactory> {
    match length {
        HashLength::Integer => Arc::new(IntegerHashFactory),
        HashLength::Long => Arc::new(LongHashFactory),
    }
}
