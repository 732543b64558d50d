//! Temporal counter codecs

use heed::RoTxn;

use planb_core::{Result, TemporalKey};

use super::reader::{write_i64, write_prefixed_str, ByteReader};
use super::traits::{check_key_length, KeySerde, Serde};
use super::CodecError;
use crate::writer::LmdbWriter;

/// Key codec for `(key, slot)`: `u16 key length, key bytes, u16 slot`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalKeySerde;

impl TemporalKeySerde {
    /// Append the prefix shared by every slot of `key`.
    pub fn write_prefix(&self, key: &str, out: &mut Vec<u8>) -> Result<()> {
        write_prefixed_str(out, key)?;
        Ok(())
    }
}

impl Serde<TemporalKey> for TemporalKeySerde {
    fn write(
        &self,
        _writer: &mut LmdbWriter<'_>,
        value: &TemporalKey,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        self.write_key(value, out)
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<TemporalKey> {
        let mut r = ByteReader::new(bytes);
        let key = r.read_prefixed_str()?;
        let slot = r.read_u16()?;
        r.finish()?;
        Ok(TemporalKey::new(key, slot))
    }
}

impl KeySerde<TemporalKey> for TemporalKeySerde {
    fn write_key(&self, key: &TemporalKey, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        self.write_prefix(&key.key, out)?;
        out.extend_from_slice(&key.slot.to_be_bytes());
        check_key_length(out.len() - start)
    }
}

/// Signed 64-bit counter value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountSerde;

impl CountSerde {
    /// Decode a count.
    pub fn decode(bytes: &[u8]) -> Result<i64> {
        if bytes.len() != 8 {
            return Err(CodecError::Truncated {
                needed: 8,
                remaining: bytes.len(),
            }
            .into());
        }
        Ok(ByteReader::new(bytes).read_i64()?)
    }
}

impl Serde<i64> for CountSerde {
    fn write(&self, _writer: &mut LmdbWriter<'_>, value: &i64, out: &mut Vec<u8>) -> Result<()> {
        write_i64(out, *value);
        Ok(())
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<i64> {
        Self::decode(bytes)
    }
}
