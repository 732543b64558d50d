//! Session key codec
//!
//! Layout: `u16 key length, key bytes, start, end`. Records of one key are
//! contiguous and ordered by start then end, so per-key scans are prefix
//! scans.

use heed::RoTxn;

use planb_core::{Result, Session, TemporalPrecision};

use super::reader::{write_prefixed_str, ByteReader};
use super::time::TimeSerde;
use super::traits::{check_key_length, KeySerde, Serde};
use crate::writer::LmdbWriter;

/// Key codec for the Session shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionKeySerde {
    time: TimeSerde,
}

impl SessionKeySerde {
    /// Codec storing start and end at `precision`.
    pub fn new(precision: TemporalPrecision) -> Self {
        SessionKeySerde {
            time: TimeSerde::new(precision),
        }
    }

    /// Precision of stored times.
    pub fn precision(&self) -> TemporalPrecision {
        self.time.precision()
    }

    /// Append the prefix shared by every session of `key`.
    pub fn write_prefix(&self, key: &str, out: &mut Vec<u8>) -> Result<()> {
        write_prefixed_str(out, key)?;
        Ok(())
    }
}

impl Serde<Session> for SessionKeySerde {
    fn write(
        &self,
        _writer: &mut LmdbWriter<'_>,
        value: &Session,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        self.write_key(value, out)
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<Session> {
        let mut r = ByteReader::new(bytes);
        let key = r.read_prefixed_str()?;
        let start = self.time.read_time(&mut r)?;
        let end = self.time.read_time(&mut r)?;
        r.finish()?;
        Session::new(key, start, end)
    }
}

impl KeySerde<Session> for SessionKeySerde {
    fn write_key(&self, key: &Session, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        self.write_prefix(key.key(), out)?;
        self.time.write_time(key.start(), out)?;
        self.time.write_time(key.end(), out)?;
        check_key_length(out.len() - start)
    }
}
