//! Byte-level helpers shared by the codecs
//!
//! Integers are big-endian. Signed integers that take part in key ordering
//! are written with the sign bit flipped so that unsigned byte comparison
//! (LMDB's default) orders them numerically.

use byteorder::{BigEndian, ByteOrder};

use super::CodecError;

const SIGN_BIT: u64 = 1 << 63;

/// Cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consume everything left.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    /// Read a big-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    /// Read a big-endian `f64`.
    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    /// Read an order-preserving `i64`.
    pub fn read_ordered_i64(&mut self) -> Result<i64, CodecError> {
        Ok((BigEndian::read_u64(self.take(8)?) ^ SIGN_BIT) as i64)
    }

    /// Read a `u16` length prefix followed by that many UTF-8 bytes.
    pub fn read_prefixed_str(&mut self) -> Result<&'a str, CodecError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.remaining() != 0 {
            return Err(CodecError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}

/// Append an order-preserving `i64`.
pub fn write_ordered_i64(out: &mut Vec<u8>, n: i64) {
    let mut b = [0u8; 8];
    BigEndian::write_u64(&mut b, n as u64 ^ SIGN_BIT);
    out.extend_from_slice(&b);
}

/// Append a big-endian `i64`.
pub fn write_i64(out: &mut Vec<u8>, n: i64) {
    let mut b = [0u8; 8];
    BigEndian::write_i64(&mut b, n);
    out.extend_from_slice(&b);
}

/// Append a `u16` length prefix and the bytes of `s`.
pub fn write_prefixed_str(out: &mut Vec<u8>, s: &str) -> Result<(), CodecError> {
    let len = u16::try_from(s.len()).map_err(|_| CodecError::TooLong(s.len()))?;
    let mut b = [0u8; 2];
    BigEndian::write_u16(&mut b, len);
    out.extend_from_slice(&b);
    out.extend_from_slice(s.as_bytes());
    Ok(())
}
