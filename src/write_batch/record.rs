//! Write batch record format.
//!
//! A serialized batch is a fixed header followed by records in append order:
//!
//! ```text
//! Header:
//!   [sequence: u64 LE] [count: u32 LE]
//!
//! Record:
//!   [tag: u8] [cf_id: varint32]? [key: lenprefixed] [value: lenprefixed]?
//! ```
//!
//! The column family id is only present for the `*Cf` tags. A length
//! prefixed slice is a varint32 length followed by that many bytes.

use crate::column_family::DEFAULT_COLUMN_FAMILY_ID;
use crate::error::{Error, Result};
use bytes::BufMut;

/// Size of the batch header (sequence + count).
pub const HEADER_SIZE: usize = 12;

/// Offset of the count field inside the header.
pub(crate) const COUNT_OFFSET: usize = 8;

/// Maximum encoded size of a varint32.
const MAX_VARINT32_LEN: usize = 5;

/// Record tags as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    /// Delete in the default column family
    Deletion = 0x00,
    /// Put in the default column family
    Value = 0x01,
    /// Merge in the default column family
    Merge = 0x02,
    /// Opaque log blob
    LogData = 0x03,
    /// Delete in an explicit column family
    ColumnFamilyDeletion = 0x04,
    /// Put in an explicit column family
    ColumnFamilyValue = 0x05,
    /// Merge in an explicit column family
    ColumnFamilyMerge = 0x06,
    /// Range delete in an explicit column family
    ColumnFamilyRangeDeletion = 0x0E,
    /// Range delete in the default column family
    RangeDeletion = 0x0F,
}

impl Tag {
    /// Convert from u8 to Tag
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Tag::Deletion),
            0x01 => Ok(Tag::Value),
            0x02 => Ok(Tag::Merge),
            0x03 => Ok(Tag::LogData),
            0x04 => Ok(Tag::ColumnFamilyDeletion),
            0x05 => Ok(Tag::ColumnFamilyValue),
            0x06 => Ok(Tag::ColumnFamilyMerge),
            0x0E => Ok(Tag::ColumnFamilyRangeDeletion),
            0x0F => Ok(Tag::RangeDeletion),
            _ => Err(Error::corruption(format!("Unknown WriteBatch tag: {:#04x}", value))),
        }
    }

    fn has_column_family(self) -> bool {
        matches!(
            self,
            Tag::ColumnFamilyDeletion
                | Tag::ColumnFamilyValue
                | Tag::ColumnFamilyMerge
                | Tag::ColumnFamilyRangeDeletion
        )
    }
}

/// Kind of a logged mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Put operation
    Put,
    /// Merge operation
    Merge,
    /// Point delete
    Delete,
    /// Range delete over `[begin, end)`
    DeleteRange,
    /// Unindexed annotation
    LogData,
}

impl RecordKind {
    /// Returns true for kinds counted by `WriteBatch::count`.
    pub fn is_structural(self) -> bool {
        !matches!(self, RecordKind::LogData)
    }
}

/// A record borrowed from serialized batch data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef<'a> {
    /// Put `key` -> `value`
    Put {
        /// Column family id
        column_family: u32,
        /// Key
        key: &'a [u8],
        /// Value
        value: &'a [u8],
    },
    /// Merge operand `value` into `key`
    Merge {
        /// Column family id
        column_family: u32,
        /// Key
        key: &'a [u8],
        /// Merge operand
        value: &'a [u8],
    },
    /// Delete `key`
    Delete {
        /// Column family id
        column_family: u32,
        /// Key
        key: &'a [u8],
    },
    /// Delete every key in `[begin, end)`
    DeleteRange {
        /// Column family id
        column_family: u32,
        /// Inclusive start key
        begin: &'a [u8],
        /// Exclusive end key
        end: &'a [u8],
    },
    /// Opaque annotation, never indexed
    LogData {
        /// Blob contents
        blob: &'a [u8],
    },
}

impl<'a> RecordRef<'a> {
    /// Returns the kind of this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordRef::Put { .. } => RecordKind::Put,
            RecordRef::Merge { .. } => RecordKind::Merge,
            RecordRef::Delete { .. } => RecordKind::Delete,
            RecordRef::DeleteRange { .. } => RecordKind::DeleteRange,
            RecordRef::LogData { .. } => RecordKind::LogData,
        }
    }

    /// Returns the column family id, or `None` for log data.
    pub fn column_family(&self) -> Option<u32> {
        match *self {
            RecordRef::Put { column_family, .. }
            | RecordRef::Merge { column_family, .. }
            | RecordRef::Delete { column_family, .. }
            | RecordRef::DeleteRange { column_family, .. } => Some(column_family),
            RecordRef::LogData { .. } => None,
        }
    }

    /// Returns the point key for records the index tracks.
    pub fn point_key(&self) -> Option<&'a [u8]> {
        match *self {
            RecordRef::Put { key, .. }
            | RecordRef::Merge { key, .. }
            | RecordRef::Delete { key, .. } => Some(key),
            RecordRef::DeleteRange { .. } | RecordRef::LogData { .. } => None,
        }
    }

    /// Copies the record out of the batch buffer.
    pub fn to_owned_record(&self) -> WriteBatchRecord {
        match *self {
            RecordRef::Put { column_family, key, value } => {
                WriteBatchRecord::Put { column_family, key: key.to_vec(), value: value.to_vec() }
            }
            RecordRef::Merge { column_family, key, value } => {
                WriteBatchRecord::Merge { column_family, key: key.to_vec(), value: value.to_vec() }
            }
            RecordRef::Delete { column_family, key } => {
                WriteBatchRecord::Delete { column_family, key: key.to_vec() }
            }
            RecordRef::DeleteRange { column_family, begin, end } => {
                WriteBatchRecord::DeleteRange { column_family, begin: begin.to_vec(), end: end.to_vec() }
            }
            RecordRef::LogData { blob } => WriteBatchRecord::LogData { blob: blob.to_vec() },
        }
    }

    fn tag(&self) -> Tag {
        let default_cf = self.column_family() == Some(DEFAULT_COLUMN_FAMILY_ID);
        match (self.kind(), default_cf) {
            (RecordKind::Put, true) => Tag::Value,
            (RecordKind::Put, false) => Tag::ColumnFamilyValue,
            (RecordKind::Merge, true) => Tag::Merge,
            (RecordKind::Merge, false) => Tag::ColumnFamilyMerge,
            (RecordKind::Delete, true) => Tag::Deletion,
            (RecordKind::Delete, false) => Tag::ColumnFamilyDeletion,
            (RecordKind::DeleteRange, true) => Tag::RangeDeletion,
            (RecordKind::DeleteRange, false) => Tag::ColumnFamilyRangeDeletion,
            (RecordKind::LogData, _) => Tag::LogData,
        }
    }

    /// Encodes the record onto the end of `buf`.
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        let tag = self.tag();
        buf.put_u8(tag as u8);
        if tag.has_column_family() {
            if let Some(cf) = self.column_family() {
                put_varint32(buf, cf);
            }
        }
        match *self {
            RecordRef::Put { key, value, .. } | RecordRef::Merge { key, value, .. } => {
                put_length_prefixed(buf, key);
                put_length_prefixed(buf, value);
            }
            RecordRef::Delete { key, .. } => put_length_prefixed(buf, key),
            RecordRef::DeleteRange { begin, end, .. } => {
                put_length_prefixed(buf, begin);
                put_length_prefixed(buf, end);
            }
            RecordRef::LogData { blob } => put_length_prefixed(buf, blob),
        }
    }

    /// Returns the number of bytes `encode_to` writes.
    pub fn encoded_size(&self) -> usize {
        let mut size = 1;
        if self.tag().has_column_family() {
            size += self.column_family().map_or(0, varint32_len);
        }
        let slice_len = |s: &[u8]| varint32_len(u32::try_from(s.len()).unwrap_or(u32::MAX)) + s.len();
        size += match *self {
            RecordRef::Put { key, value, .. } | RecordRef::Merge { key, value, .. } => {
                slice_len(key) + slice_len(value)
            }
            RecordRef::Delete { key, .. } => slice_len(key),
            RecordRef::DeleteRange { begin, end, .. } => slice_len(begin) + slice_len(end),
            RecordRef::LogData { blob } => slice_len(blob),
        };
        size
    }
}

/// Decodes the record starting at `*pos` and advances `*pos` past it.
pub fn decode_record<'a>(data: &'a [u8], pos: &mut usize) -> Result<RecordRef<'a>> {
    let mut input = data
        .get(*pos..)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| Error::corruption(format!("No record at offset {}", pos)))?;
    let start_len = input.len();

    let tag = Tag::from_u8(input[0])?;
    input = &input[1..];

    let column_family =
        if tag.has_column_family() { get_varint32(&mut input)? } else { DEFAULT_COLUMN_FAMILY_ID };

    let record = match tag {
        Tag::Value | Tag::ColumnFamilyValue => {
            let key = get_length_prefixed(&mut input)?;
            let value = get_length_prefixed(&mut input)?;
            RecordRef::Put { column_family, key, value }
        }
        Tag::Merge | Tag::ColumnFamilyMerge => {
            let key = get_length_prefixed(&mut input)?;
            let value = get_length_prefixed(&mut input)?;
            RecordRef::Merge { column_family, key, value }
        }
        Tag::Deletion | Tag::ColumnFamilyDeletion => {
            let key = get_length_prefixed(&mut input)?;
            RecordRef::Delete { column_family, key }
        }
        Tag::RangeDeletion | Tag::ColumnFamilyRangeDeletion => {
            let begin = get_length_prefixed(&mut input)?;
            let end = get_length_prefixed(&mut input)?;
            RecordRef::DeleteRange { column_family, begin, end }
        }
        Tag::LogData => RecordRef::LogData { blob: get_length_prefixed(&mut input)? },
    };

    *pos += start_len - input.len();
    Ok(record)
}

/// An owned record, as yielded by `WriteBatchIterator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBatchRecord {
    /// Put `key` -> `value`
    Put {
        /// Column family id
        column_family: u32,
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Merge operand `value` into `key`
    Merge {
        /// Column family id
        column_family: u32,
        /// Key
        key: Vec<u8>,
        /// Merge operand
        value: Vec<u8>,
    },
    /// Delete `key`
    Delete {
        /// Column family id
        column_family: u32,
        /// Key
        key: Vec<u8>,
    },
    /// Delete every key in `[begin, end)`
    DeleteRange {
        /// Column family id
        column_family: u32,
        /// Inclusive start key
        begin: Vec<u8>,
        /// Exclusive end key
        end: Vec<u8>,
    },
    /// Opaque annotation
    LogData {
        /// Blob contents
        blob: Vec<u8>,
    },
}

impl WriteBatchRecord {
    /// Borrows the record in its wire form.
    pub fn as_ref(&self) -> RecordRef<'_> {
        match self {
            WriteBatchRecord::Put { column_family, key, value } => {
                RecordRef::Put { column_family: *column_family, key, value }
            }
            WriteBatchRecord::Merge { column_family, key, value } => {
                RecordRef::Merge { column_family: *column_family, key, value }
            }
            WriteBatchRecord::Delete { column_family, key } => {
                RecordRef::Delete { column_family: *column_family, key }
            }
            WriteBatchRecord::DeleteRange { column_family, begin, end } => {
                RecordRef::DeleteRange { column_family: *column_family, begin, end }
            }
            WriteBatchRecord::LogData { blob } => RecordRef::LogData { blob },
        }
    }

    /// Returns the kind of this record.
    pub fn kind(&self) -> RecordKind {
        self.as_ref().kind()
    }

    /// Returns the column family id, or `None` for log data.
    pub fn column_family(&self) -> Option<u32> {
        self.as_ref().column_family()
    }
}

fn varint32_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

fn put_varint32(buf: &mut impl BufMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn get_varint32(input: &mut &[u8]) -> Result<u32> {
    let mut result = 0u32;
    for (i, &byte) in input.iter().take(MAX_VARINT32_LEN).enumerate() {
        if i == MAX_VARINT32_LEN - 1 && byte > 0x0F {
            return Err(Error::corruption("varint32 overflows 32 bits"));
        }
        result |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            *input = &input[i + 1..];
            return Ok(result);
        }
    }
    Err(Error::corruption("Truncated or overlong varint32"))
}

/// Panics if `data` is 4GiB or larger; the format cannot express it.
fn put_length_prefixed(buf: &mut impl BufMut, data: &[u8]) {
    let len = match u32::try_from(data.len()) {
        Ok(len) => len,
        Err(_) => panic!("WriteBatch slice of {} bytes exceeds the 4GiB record limit", data.len()),
    };
    put_varint32(buf, len);
    buf.put_slice(data);
}

fn get_length_prefixed<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = get_varint32(input)? as usize;
    if input.len() < len {
        return Err(Error::corruption(format!(
            "Slice length {} exceeds remaining {} bytes",
            len,
            input.len()
        )));
    }
    let (slice, rest) = input.split_at(len);
    *input = rest;
    Ok(slice)
}
