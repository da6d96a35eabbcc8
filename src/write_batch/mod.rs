//! WriteBatch is the append-only log of pending mutations.
//!
//! The batch keeps its records serialized in a single buffer, in exactly the
//! format returned by [`WriteBatch::data`]. Records are never rewritten; the
//! only way to remove them is to truncate the tail (see save points).
//!
//! # Example
//!
//! ```rust
//! use indexed_batch::WriteBatch;
//!
//! let mut batch = WriteBatch::new();
//! batch.put(b"key1", b"value1");
//! batch.delete(b"key2");
//! batch.put_log_data(b"txn-42");
//!
//! // Log data is not counted
//! assert_eq!(batch.count(), 2);
//!
//! let records: Vec<_> = batch.iter().collect::<Result<_, _>>().unwrap();
//! assert_eq!(records.len(), 3);
//! ```

mod iterator;
mod record;

pub use iterator::WriteBatchIterator;
pub use record::{decode_record, RecordKind, RecordRef, Tag, WriteBatchRecord, HEADER_SIZE};

use crate::column_family::ColumnFamilyHandle;
use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use record::COUNT_OFFSET;

/// Which record kinds a batch contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentFlags(u8);

impl ContentFlags {
    const PUT: u8 = 1 << 0;
    const DELETE: u8 = 1 << 1;
    const MERGE: u8 = 1 << 2;
    const DELETE_RANGE: u8 = 1 << 3;

    fn add(&mut self, kind: RecordKind) {
        self.0 |= match kind {
            RecordKind::Put => Self::PUT,
            RecordKind::Delete => Self::DELETE,
            RecordKind::Merge => Self::MERGE,
            RecordKind::DeleteRange => Self::DELETE_RANGE,
            RecordKind::LogData => 0,
        };
    }

    /// Returns true if the batch holds a put.
    pub fn has_put(self) -> bool {
        self.0 & Self::PUT != 0
    }

    /// Returns true if the batch holds a point delete.
    pub fn has_delete(self) -> bool {
        self.0 & Self::DELETE != 0
    }

    /// Returns true if the batch holds a merge.
    pub fn has_merge(self) -> bool {
        self.0 & Self::MERGE != 0
    }

    /// Returns true if the batch holds a range delete.
    pub fn has_delete_range(self) -> bool {
        self.0 & Self::DELETE_RANGE != 0
    }
}

/// Callbacks invoked by [`WriteBatch::iterate`], one per record.
///
/// Merge and range-delete default to an error so that a handler which does
/// not understand them fails loudly instead of dropping mutations.
pub trait Handler {
    /// Called for each put.
    fn put_cf(&mut self, column_family: u32, key: &[u8], value: &[u8]) -> Result<()>;

    /// Called for each point delete.
    fn delete_cf(&mut self, column_family: u32, key: &[u8]) -> Result<()>;

    /// Called for each merge.
    fn merge_cf(&mut self, _column_family: u32, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(Error::invalid_argument("Merge not supported by this handler"))
    }

    /// Called for each range delete.
    fn delete_range_cf(&mut self, _column_family: u32, _begin: &[u8], _end: &[u8]) -> Result<()> {
        Err(Error::invalid_argument("DeleteRange not supported by this handler"))
    }

    /// Called for each log data blob.
    fn log_data(&mut self, _blob: &[u8]) {}
}

/// An append-only buffer of serialized mutations.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    rep: BytesMut,
    content_flags: ContentFlags,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBatch {
    /// Creates a new empty WriteBatch.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new empty WriteBatch with `reserved_bytes` preallocated.
    pub fn with_capacity(reserved_bytes: usize) -> Self {
        let mut rep = BytesMut::with_capacity(reserved_bytes.max(HEADER_SIZE));
        rep.put_bytes(0, HEADER_SIZE);
        Self { rep, content_flags: ContentFlags::default() }
    }

    /// Adopts serialized batch data, validating every record.
    ///
    /// # Errors
    ///
    /// Returns `Error::Corruption` if the header is short, a record is
    /// malformed, or the header count disagrees with the records.
    pub fn from_data(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::corruption(format!(
                "WriteBatch data too small: {} bytes",
                data.len()
            )));
        }
        let mut batch = Self { rep: BytesMut::from(data), content_flags: ContentFlags::default() };

        let mut flags = ContentFlags::default();
        let mut found = 0u32;
        let mut pos = HEADER_SIZE;
        while pos < batch.rep.len() {
            let record = decode_record(&batch.rep, &mut pos)?;
            flags.add(record.kind());
            if record.kind().is_structural() {
                found += 1;
            }
        }
        if found != batch.count() {
            return Err(Error::corruption(format!(
                "WriteBatch has wrong count: header says {}, found {}",
                batch.count(),
                found
            )));
        }
        batch.content_flags = flags;
        Ok(batch)
    }

    /// Adds a Put operation in the default column family.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.append(&RecordRef::Put { column_family: 0, key, value });
    }

    /// Adds a Put operation in `cf`.
    pub fn put_cf(&mut self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.append(&RecordRef::Put { column_family: cf.id(), key, value });
    }

    /// Adds a Merge operation in the default column family.
    pub fn merge(&mut self, key: &[u8], value: &[u8]) {
        self.append(&RecordRef::Merge { column_family: 0, key, value });
    }

    /// Adds a Merge operation in `cf`.
    pub fn merge_cf(&mut self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.append(&RecordRef::Merge { column_family: cf.id(), key, value });
    }

    /// Adds a Delete operation in the default column family.
    pub fn delete(&mut self, key: &[u8]) {
        self.append(&RecordRef::Delete { column_family: 0, key });
    }

    /// Adds a Delete operation in `cf`.
    pub fn delete_cf(&mut self, cf: &ColumnFamilyHandle, key: &[u8]) {
        self.append(&RecordRef::Delete { column_family: cf.id(), key });
    }

    /// Adds a DeleteRange over `[begin, end)` in the default column family.
    pub fn delete_range(&mut self, begin: &[u8], end: &[u8]) {
        self.append(&RecordRef::DeleteRange { column_family: 0, begin, end });
    }

    /// Adds a DeleteRange over `[begin, end)` in `cf`.
    pub fn delete_range_cf(&mut self, cf: &ColumnFamilyHandle, begin: &[u8], end: &[u8]) {
        self.append(&RecordRef::DeleteRange { column_family: cf.id(), begin, end });
    }

    /// Appends an opaque blob. It is not counted and never applied.
    pub fn put_log_data(&mut self, blob: &[u8]) {
        self.append(&RecordRef::LogData { blob });
    }

    /// Appends one record and returns its offset in the serialized data.
    pub(crate) fn append(&mut self, record: &RecordRef<'_>) -> usize {
        let offset = self.rep.len();
        self.rep.reserve(record.encoded_size());
        record.encode_to(&mut self.rep);
        if record.kind().is_structural() {
            let count = match self.count().checked_add(1) {
                Some(count) => count,
                None => panic!("WriteBatch record count overflows u32"),
            };
            self.set_count(count);
        }
        self.content_flags.add(record.kind());
        offset
    }

    /// Decodes the record stored at `offset`.
    pub fn record_at(&self, offset: usize) -> Result<RecordRef<'_>> {
        if offset < HEADER_SIZE {
            return Err(Error::invalid_argument(format!(
                "Offset {} points into the batch header",
                offset
            )));
        }
        let mut pos = offset;
        decode_record(&self.rep, &mut pos)
    }

    /// Drops everything past `size` bytes and restores the header count.
    pub(crate) fn truncate(&mut self, size: usize, count: u32, content_flags: ContentFlags) {
        self.rep.truncate(size.max(HEADER_SIZE));
        self.set_count(count);
        self.content_flags = content_flags;
    }

    /// Removes all records and resets the header.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.put_bytes(0, HEADER_SIZE);
        self.content_flags = ContentFlags::default();
    }

    /// Returns the serialized batch.
    pub fn data(&self) -> &[u8] {
        &self.rep
    }

    /// Returns the size of the serialized batch in bytes.
    pub fn data_size(&self) -> usize {
        self.rep.len()
    }

    /// Returns the number of Put, Merge, Delete and DeleteRange records.
    pub fn count(&self) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.rep[COUNT_OFFSET..HEADER_SIZE]);
        u32::from_le_bytes(raw)
    }

    fn set_count(&mut self, count: u32) {
        self.rep[COUNT_OFFSET..HEADER_SIZE].copy_from_slice(&count.to_le_bytes());
    }

    /// Returns the sequence number stored in the header.
    pub fn sequence(&self) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.rep[..COUNT_OFFSET]);
        u64::from_le_bytes(raw)
    }

    /// Stores `sequence` in the header.
    pub fn set_sequence(&mut self, sequence: u64) {
        self.rep[..COUNT_OFFSET].copy_from_slice(&sequence.to_le_bytes());
    }

    /// Returns true if the batch holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.rep.len() == HEADER_SIZE
    }

    /// Returns the record kinds present in the batch.
    pub fn content_flags(&self) -> ContentFlags {
        self.content_flags
    }

    /// Returns an iterator over a snapshot of the current records.
    pub fn iter(&self) -> WriteBatchIterator {
        WriteBatchIterator::new(self.data())
    }

    /// Feeds every record to `handler` in append order.
    ///
    /// Stops at the first handler error or corrupt record.
    pub fn iterate(&self, handler: &mut dyn Handler) -> Result<()> {
        let mut pos = HEADER_SIZE;
        let mut found = 0u32;
        while pos < self.rep.len() {
            let record = decode_record(&self.rep, &mut pos)?;
            match record {
                RecordRef::Put { column_family, key, value } => {
                    handler.put_cf(column_family, key, value)?
                }
                RecordRef::Merge { column_family, key, value } => {
                    handler.merge_cf(column_family, key, value)?
                }
                RecordRef::Delete { column_family, key } => handler.delete_cf(column_family, key)?,
                RecordRef::DeleteRange { column_family, begin, end } => {
                    handler.delete_range_cf(column_family, begin, end)?
                }
                RecordRef::LogData { blob } => handler.log_data(blob),
            }
            if record.kind().is_structural() {
                found += 1;
            }
        }
        if found != self.count() {
            return Err(Error::corruption(format!(
                "WriteBatch has wrong count: header says {}, found {}",
                self.count(),
                found
            )));
        }
        Ok(())
    }
}
