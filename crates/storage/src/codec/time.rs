//! Instant codecs

use chrono::{DateTime, Utc};
use heed::RoTxn;

use planb_core::{Result, TemporalPrecision};

use super::reader::{write_ordered_i64, ByteReader};
use super::traits::Serde;
use super::CodecError;
use crate::writer::LmdbWriter;

/// Encodes instants at a fixed [`TemporalPrecision`] as 8 order-preserving
/// bytes.
///
/// Decoding returns the instant truncated to the precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSerde {
    precision: TemporalPrecision,
}

impl TimeSerde {
    /// Encoded width.
    pub const LEN: usize = 8;

    /// Codec for `precision`.
    pub fn new(precision: TemporalPrecision) -> Self {
        TimeSerde { precision }
    }

    /// Precision of encoded instants.
    pub fn precision(&self) -> TemporalPrecision {
        self.precision
    }

    /// Append `instant`.
    pub fn write_time(&self, instant: DateTime<Utc>, out: &mut Vec<u8>) -> Result<()> {
        write_ordered_i64(out, self.precision.to_units(instant)?);
        Ok(())
    }

    /// Read an instant from `r`.
    pub fn read_time(&self, r: &mut ByteReader<'_>) -> Result<DateTime<Utc>> {
        let units = r.read_ordered_i64()?;
        self.precision.from_units(units)
    }
}

impl Serde<DateTime<Utc>> for TimeSerde {
    fn write(
        &self,
        _writer: &mut LmdbWriter<'_>,
        value: &DateTime<Utc>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        self.write_time(*value, out)
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<DateTime<Utc>> {
        let mut r = ByteReader::new(bytes);
        let t = self.read_time(&mut r)?;
        r.finish()?;
        Ok(t)
    }
}

/// Millisecond instants, used for insert times.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSerde;

impl InstantSerde {
    const INNER: TimeSerde = TimeSerde {
        precision: TemporalPrecision::Millisecond,
    };

    /// Append `instant` at millisecond precision.
    pub fn write_instant(instant: DateTime<Utc>, out: &mut Vec<u8>) -> Result<()> {
        Self::INNER.write_time(instant, out)
    }

    /// Read a millisecond instant from `r`.
    pub fn read_instant(r: &mut ByteReader<'_>) -> Result<DateTime<Utc>> {
        Self::INNER.read_time(r)
    }
}

impl Serde<DateTime<Utc>> for InstantSerde {
    fn write(
        &self,
        _writer: &mut LmdbWriter<'_>,
        value: &DateTime<Utc>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        Self::write_instant(*value, out)
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<DateTime<Utc>> {
        if bytes.len() != TimeSerde::LEN {
            return Err(CodecError::Truncated {
                needed: TimeSerde::LEN,
                remaining: bytes.len(),
            }
            .into());
        }
        Self::read_instant(&mut ByteReader::new(bytes))
    }
}
