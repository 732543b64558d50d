//! Codecs for the State and RangedState shapes

use std::sync::Arc;

use heed::RoTxn;

use planb_core::{KeyRange, Result, StateValue, Val};

use super::reader::{write_ordered_i64, ByteReader};
use super::time::{InstantSerde, TimeSerde};
use super::traits::{check_key_length, KeySerde, Serde};
use super::val::VariableValSerde;
use super::CodecError;
use crate::recorder::UsedLookupsRecorder;
use crate::writer::LmdbWriter;

/// Plain UTF-8 string keys, limited to [`super::MAX_KEY_LENGTH`] bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringKeySerde;

impl Serde<String> for StringKeySerde {
    fn write(&self, _writer: &mut LmdbWriter<'_>, value: &String, out: &mut Vec<u8>) -> Result<()> {
        self.write_key(value, out)
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<String> {
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(s.to_string())
    }
}

impl KeySerde<String> for StringKeySerde {
    fn write_key(&self, key: &String, out: &mut Vec<u8>) -> Result<()> {
        check_key_length(key.len())?;
        out.extend_from_slice(key.as_bytes());
        Ok(())
    }
}

/// `[from, to]` keys as two order-preserving integers.
///
/// Ranges sort by lower bound, so the range containing `n` (if any) is the
/// last one at or before `(n, i64::MAX)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeKeySerde;

impl RangeKeySerde {
    /// Encoded width.
    pub const LEN: usize = 16;

    /// Upper seek bound for ranges that may contain `n`.
    pub fn seek_upper(n: i64) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        write_ordered_i64(&mut out, n);
        write_ordered_i64(&mut out, i64::MAX);
        out
    }
}

impl Serde<KeyRange> for RangeKeySerde {
    fn write(
        &self,
        _writer: &mut LmdbWriter<'_>,
        value: &KeyRange,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        self.write_key(value, out)
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<KeyRange> {
        let mut r = ByteReader::new(bytes);
        let from = r.read_ordered_i64()?;
        let to = r.read_ordered_i64()?;
        r.finish()?;
        KeyRange::new(from, to)
    }
}

impl KeySerde<KeyRange> for RangeKeySerde {
    fn write_key(&self, key: &KeyRange, out: &mut Vec<u8>) -> Result<()> {
        write_ordered_i64(out, key.from());
        write_ordered_i64(out, key.to());
        Ok(())
    }
}

/// `insert time, value` with the value in [`VariableValSerde`] form.
pub struct StateValueSerde {
    val: Arc<VariableValSerde>,
}

impl StateValueSerde {
    /// Wrap a variable value codec.
    pub fn new(val: Arc<VariableValSerde>) -> Self {
        StateValueSerde { val }
    }

    /// Read only the insert time, without touching the value or dictionary.
    pub fn insert_time(bytes: &[u8]) -> Result<chrono::DateTime<chrono::Utc>> {
        InstantSerde::read_instant(&mut ByteReader::new(bytes))
    }
}

impl Serde<StateValue> for StateValueSerde {
    fn write(
        &self,
        writer: &mut LmdbWriter<'_>,
        value: &StateValue,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        InstantSerde::write_instant(value.insert_time, out)?;
        self.val.write(writer, &value.value, out)
    }

    fn read(&self, txn: &RoTxn<'_>, bytes: &[u8]) -> Result<StateValue> {
        let mut r = ByteReader::new(bytes);
        let insert_time = InstantSerde::read_instant(&mut r)?;
        let value: Val = self.val.read(txn, r.rest())?;
        Ok(StateValue { insert_time, value })
    }

    fn uses_lookup(&self, bytes: &[u8]) -> bool {
        bytes.len() > TimeSerde::LEN && self.val.uses_lookup(&bytes[TimeSerde::LEN..])
    }

    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        self.val.recorder_at(TimeSerde::LEN)
    }
}
