//! Iterator over serialized write batch records.
//!
//! The iterator owns a copy of the batch bytes taken when it is created, so
//! later appends or rollbacks on the batch do not affect it.

use super::record::{decode_record, WriteBatchRecord, COUNT_OFFSET, HEADER_SIZE};
use crate::error::Result;
use bytes::Bytes;

/// Yields the records of a serialized batch in append order.
///
/// Data shorter than the header, or whose header count disagrees with the
/// records it holds, yields nothing. After the first decode error the
/// iterator is exhausted.
#[derive(Debug, Clone)]
pub struct WriteBatchIterator {
    data: Bytes,
    pos: usize,
    remaining: u32,
    done: bool,
}

impl WriteBatchIterator {
    /// Creates an iterator over serialized batch data (header included).
    pub fn new(data: &[u8]) -> Self {
        if data.len() < HEADER_SIZE {
            log::warn!("WriteBatch data shorter than header ({} bytes), nothing to iterate", data.len());
            return Self { data: Bytes::new(), pos: 0, remaining: 0, done: true };
        }

        let mut raw = [0u8; 4];
        raw.copy_from_slice(&data[COUNT_OFFSET..HEADER_SIZE]);
        let count = u32::from_le_bytes(raw);

        if let Some(found) = structural_records(data) {
            if found != u64::from(count) {
                log::warn!(
                    "WriteBatch header claims {} records but holds {}, nothing to iterate",
                    count,
                    found
                );
                return Self { data: Bytes::new(), pos: 0, remaining: 0, done: true };
            }
        }

        Self { data: Bytes::copy_from_slice(&data[HEADER_SIZE..]), pos: 0, remaining: count, done: false }
    }

    /// Returns how many structural records the header says are left.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Iterator for WriteBatchIterator {
    type Item = Result<WriteBatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.pos >= self.data.len() {
            self.done = true;
            return None;
        }

        match decode_record(&self.data, &mut self.pos) {
            Ok(record) => {
                if record.kind().is_structural() {
                    self.remaining = self.remaining.saturating_sub(1);
                }
                Some(Ok(record.to_owned_record()))
            }
            Err(e) => {
                log::warn!("Corrupt WriteBatch record at offset {}: {}", self.pos + HEADER_SIZE, e);
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for WriteBatchIterator {}

/// Counts the structural records in `data`, or `None` if a record fails to
/// decode (the iterator reports that error itself when it gets there).
fn structural_records(data: &[u8]) -> Option<u64> {
    let mut pos = HEADER_SIZE;
    let mut found = 0u64;
    while pos < data.len() {
        let record = decode_record(data, &mut pos).ok()?;
        if record.kind().is_structural() {
            found += 1;
        }
    }
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::write_batch::{RecordKind, WriteBatch};

    #[test]
    fn test_iterate_in_order() {
        let mut batch = WriteBatch::new();
        batch.put(b"key1", b"value1");
        batch.delete(b"key2");
        batch.put_log_data(b"meta");
        batch.delete_range(b"a", b"c");

        let mut iter = batch.iter();
        assert_eq!(iter.remaining(), 3);

        let kinds: Vec<_> = iter.by_ref().map(|r| r.unwrap().kind()).collect();
        assert_eq!(
            kinds,
            vec![RecordKind::Put, RecordKind::Delete, RecordKind::LogData, RecordKind::DeleteRange]
        );
        assert_eq!(iter.remaining(), 0);
    }

    #[test]
    fn test_empty_and_degenerate_data() {
        assert_eq!(WriteBatchIterator::new(&[]).count(), 0);
        assert_eq!(WriteBatchIterator::new(&[0u8; 11]).count(), 0);
        assert_eq!(WriteBatchIterator::new(&[0u8; HEADER_SIZE]).count(), 0);
    }

    #[test]
    fn test_snapshot_is_independent_of_batch() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        let iter = batch.iter();
        batch.put(b"b", b"2");

        assert_eq!(iter.count(), 1);
    }

    #[test]
    fn test_corrupt_record_stops_iteration() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");
        let mut data = batch.data().to_vec();
        let second = data.len() - 5;
        data[second] = 0x42;

        let results: Vec<_> = WriteBatchIterator::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Corruption(_))));
    }

    #[test]
    fn test_wrong_header_count_yields_nothing() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");
        let mut data = batch.data().to_vec();

        // Too high
        data[COUNT_OFFSET] = 3;
        let mut iter = WriteBatchIterator::new(&data);
        assert_eq!(iter.remaining(), 0);
        assert!(iter.next().is_none());

        // Too low
        data[COUNT_OFFSET] = 1;
        assert_eq!(WriteBatchIterator::new(&data).count(), 0);

        // Matching
        data[COUNT_OFFSET] = 2;
        assert_eq!(WriteBatchIterator::new(&data).count(), 2);
    }

    #[test]
    fn test_log_data_does_not_count_against_header() {
        let mut batch = WriteBatch::new();
        batch.put_log_data(b"meta");
        let data = batch.data().to_vec();

        let records: Vec<_> = WriteBatchIterator::new(&data).collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_ok());
    }
}
