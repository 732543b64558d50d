//! Codecs for [`Val`]

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use heed::RoTxn;

use planb_core::{Result, Val, ValType};

use super::reader::{write_i64, ByteReader};
use super::traits::Serde;
use super::CodecError;
use crate::dictionary::{HashLookupDb, LookupPut};
use crate::recorder::{DictionaryRecorder, RefLocator, UsedLookupsRecorder};
use crate::writer::LmdbWriter;

/// Append the tagged encoding of `val`.
///
/// Variable-length payloads run to the end of the buffer, so a `Val` is
/// always the last field of whatever contains it.
pub fn encode_val(val: &Val, out: &mut Vec<u8>) {
    out.push(val.val_type() as u8);
    match val {
        Val::Null => {}
        Val::Boolean(b) => out.push(*b as u8),
        Val::Long(n) | Val::Date(n) => write_i64(out, *n),
        Val::Double(d) => {
            let mut b = [0u8; 8];
            BigEndian::write_f64(&mut b, *d);
            out.extend_from_slice(&b);
        }
        Val::String(s) => out.extend_from_slice(s.as_bytes()),
        Val::Bytes(b) => out.extend_from_slice(b),
    }
}

/// Decode a `Val`, consuming the rest of the reader.
pub fn decode_val(r: &mut ByteReader<'_>) -> std::result::Result<Val, CodecError> {
    let tag = r.read_u8()?;
    let val_type = ValType::from_tag(tag).ok_or(CodecError::UnknownTag(tag))?;
    let val = match val_type {
        ValType::Null => Val::Null,
        ValType::Boolean => match r.read_u8()? {
            0 => Val::Boolean(false),
            1 => Val::Boolean(true),
            other => return Err(CodecError::UnknownTag(other)),
        },
        ValType::Long => Val::Long(r.read_i64()?),
        ValType::Date => Val::Date(r.read_i64()?),
        ValType::Double => Val::Double(r.read_f64()?),
        ValType::String => Val::String(
            std::str::from_utf8(r.rest())
                .map_err(|_| CodecError::InvalidUtf8)?
                .to_string(),
        ),
        ValType::Bytes => Val::Bytes(r.rest().to_vec()),
    };
    r.finish()?;
    Ok(val)
}

/// Inline-only value codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValSerde;

impl Serde<Val> for ValSerde {
    fn write(&self, _writer: &mut LmdbWriter<'_>, value: &Val, out: &mut Vec<u8>) -> Result<()> {
        encode_val(value, out);
        Ok(())
    }

    fn read(&self, _txn: &RoTxn<'_>, bytes: &[u8]) -> Result<Val> {
        Ok(decode_val(&mut ByteReader::new(bytes))?)
    }
}

/// Value codec that moves large values into the dictionary.
///
/// Encodings up to `inline_threshold` bytes are stored inline behind
/// [`RefLocator::INLINE_TAG`]. Larger ones are stored once in the
/// dictionary and replaced by [`RefLocator::LOOKUP_TAG`] and their hash. If
/// the hash clashes with a different payload the value is stored inline.
pub struct VariableValSerde {
    lookup: Arc<HashLookupDb>,
    inline_threshold: usize,
    recorder: DictionaryRecorder,
}

impl VariableValSerde {
    /// Codec writing large values to `lookup`.
    pub fn new(lookup: Arc<HashLookupDb>, inline_threshold: usize) -> Self {
        let recorder = DictionaryRecorder::new(Arc::clone(&lookup), Self::locator(&lookup));
        VariableValSerde {
            lookup,
            inline_threshold,
            recorder,
        }
    }

    fn locator(lookup: &HashLookupDb) -> RefLocator {
        RefLocator::new(0, lookup.hash_length())
    }

    /// Recorder for records that embed this encoding `offset` bytes in.
    pub fn recorder_at(&self, offset: usize) -> Arc<dyn UsedLookupsRecorder> {
        Arc::new(DictionaryRecorder::new(
            Arc::clone(&self.lookup),
            Self::locator(&self.lookup).shifted(offset),
        ))
    }
}

impl Serde<Val> for VariableValSerde {
    fn write(&self, writer: &mut LmdbWriter<'_>, value: &Val, out: &mut Vec<u8>) -> Result<()> {
        let mut payload = Vec::new();
        encode_val(value, &mut payload);
        if payload.len() > self.inline_threshold {
            if let LookupPut::Stored(hash) = self.lookup.put(writer, &payload)? {
                let start = out.len() + 1;
                out.push(RefLocator::LOOKUP_TAG);
                hash.write(out);
                self.recorder.record_used(writer, &out[start..]);
                return Ok(());
            }
        }
        out.push(RefLocator::INLINE_TAG);
        out.extend_from_slice(&payload);
        Ok(())
    }

    fn read(&self, txn: &RoTxn<'_>, bytes: &[u8]) -> Result<Val> {
        let mut r = ByteReader::new(bytes);
        match r.read_u8()? {
            RefLocator::INLINE_TAG => Ok(decode_val(&mut r)?),
            RefLocator::LOOKUP_TAG => {
                let hash = r.take(self.lookup.hash_length())?;
                r.finish()?;
                let payload = self.lookup.get(txn, hash)?.ok_or_else(|| {
                    CodecError::MissingLookup(
                        planb_core::Hash::from_bytes(hash)
                            .map(|h| h.to_string())
                            .unwrap_or_default(),
                    )
                })?;
                Ok(decode_val(&mut ByteReader::new(payload))?)
            }
            tag => Err(CodecError::UnknownTag(tag).into()),
        }
    }

    fn uses_lookup(&self, bytes: &[u8]) -> bool {
        Self::locator(&self.lookup).locate(bytes).is_some()
    }

    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        self.recorder_at(0)
    }
}
