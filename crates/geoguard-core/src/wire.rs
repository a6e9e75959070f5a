//! Schema-less protobuf wire format decoding.
//!
//! ## Wire Format Overview
//!
//! Each field is encoded as:
//! - A varint key containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types understood here:
//! - 0: VARINT
//! - 1: I64 (8 raw bytes)
//! - 2: LEN (varint length, then that many bytes)
//! - 5: I32 (4 raw bytes)
//!
//! The deprecated group markers (3, 4) and the unassigned values (6, 7) are
//! rejected. Nothing here knows what a field means; interpretation is left to
//! the caller, which usually matches on `(number, wire_type)` and ignores the
//! rest.

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;
use std::ops::Range;

/// Maximum encoded length of a 64-bit varint
pub const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// 32-bit fixed-width
    I32 = 5,
}

impl WireType {
    /// Decodes the low three bits of a field key
    ///
    /// `offset` is only used for the error.
    pub fn from_key_bits(value: u8, offset: usize) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            5 => Ok(WireType::I32),
            _ => Err(Error::UnknownWireType {
                wire_type: value,
                offset,
            }),
        }
    }
}

/// Payload of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// Decoded varint
    Varint(u64),
    /// Raw little-endian bytes of a 64-bit value
    Fixed64([u8; 8]),
    /// Length-delimited payload
    Bytes(&'a [u8]),
    /// Raw little-endian bytes of a 32-bit value
    Fixed32([u8; 4]),
}

/// One decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireField<'a> {
    /// Field number from the key
    pub number: u32,
    /// Wire type from the key
    pub wire_type: WireType,
    /// Field payload
    pub value: FieldValue<'a>,
    /// Absolute offset of the key in the buffer
    pub offset: usize,
    /// Absolute range of the payload bytes (after any length prefix)
    pub payload: Range<usize>,
}

impl<'a> WireField<'a> {
    /// Returns the payload of a length-delimited field
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self.value {
            FieldValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns true if this field has the given number and is length-delimited
    pub fn is_len(&self, number: u32) -> bool {
        self.number == number && self.wire_type == WireType::Len
    }
}

/// Decode a varint starting at `offset` in `data`.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let available = data.len().saturating_sub(offset);

    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = data.get(offset + i) else {
            return Err(Error::truncated(offset, i as u64 + 1, available));
        };

        // Bits past the 64th are dropped, matching the reference decoders
        result |= ((byte & 0x7F) as u64) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::MalformedVarint { offset })
}

/// Lazy reader over the fields of one message.
///
/// The reader owns its cursor and covers a fixed byte range of the buffer,
/// so nested messages get a fresh reader over the payload range of their
/// enclosing field. Offsets in fields and errors are always absolute.
///
/// After the first error the reader is exhausted; there is no
/// resynchronization.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    data: &'a [u8],
    position: usize,
    failed: bool,
}

impl<'a> FieldReader<'a> {
    /// Creates a reader over the whole buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            failed: false,
        }
    }

    /// Creates a reader over `range` of `data`
    ///
    /// A range reaching past the buffer is clamped; the caller obtains ranges
    /// from [`WireField::payload`], which are always in bounds.
    pub fn with_range(data: &'a [u8], range: Range<usize>) -> Self {
        let end = range.end.min(data.len());
        Self {
            data: &data[..end],
            position: range.start.min(end),
            failed: false,
        }
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns true once the cursor sits exactly at the end of the range
    pub fn is_finished(&self) -> bool {
        self.position >= self.data.len()
    }

    fn take(&mut self, len: u64) -> Result<Range<usize>> {
        let available = self.data.len() - self.position;
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= available)
            .ok_or_else(|| Error::truncated(self.position, len, available))?;

        let range = self.position..self.position + len;
        self.position += len;
        Ok(range)
    }

    fn read_varint(&mut self) -> Result<u64> {
        let (value, len) = decode_varint(self.data, self.position)?;
        self.position += len;
        Ok(value)
    }

    fn read_field(&mut self) -> Result<WireField<'a>> {
        let offset = self.position;
        let key = self.read_varint()?;

        let wire_type = WireType::from_key_bits((key & 0x07) as u8, offset)?;
        let number = key >> 3;
        if number == 0 || number > MAX_FIELD_NUMBER as u64 {
            return Err(Error::InvalidFieldNumber { number, offset });
        }

        let (value, payload) = match wire_type {
            WireType::Varint => {
                let start = self.position;
                let value = self.read_varint()?;
                (FieldValue::Varint(value), start..self.position)
            }
            WireType::I64 => {
                let range = self.take(8)?;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&self.data[range.clone()]);
                (FieldValue::Fixed64(bytes), range)
            }
            WireType::Len => {
                let length = self.read_varint()?;
                let range = self.take(length)?;
                (FieldValue::Bytes(&self.data[range.clone()]), range)
            }
            WireType::I32 => {
                let range = self.take(4)?;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&self.data[range.clone()]);
                (FieldValue::Fixed32(bytes), range)
            }
        };

        Ok(WireField {
            number: number as u32,
            wire_type,
            value,
            offset,
            payload,
        })
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = Result<WireField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.is_finished() {
            return None;
        }

        let field = self.read_field();
        if field.is_err() {
            self.failed = true;
        }
        Some(field)
    }
}

impl std::iter::FusedIterator for FieldReader<'_> {}
