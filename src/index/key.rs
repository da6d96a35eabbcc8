//! # Index Entry Format
//!
//! ```text
//! IndexEntry:
//!   [column_family: u32] [key: bytes] [offset: usize]
//! ```
//!
//! Entries are ordered by column family, then key bytes, then log offset, so
//! all entries of one (column family, key) pair are adjacent and sorted
//! oldest to newest.

use std::cmp::Ordering;

/// One indexed record: where a key was written in the batch log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    column_family: u32,
    key: Vec<u8>,
    offset: usize,
}

impl IndexEntry {
    /// Creates a new IndexEntry.
    pub fn new(column_family: u32, key: Vec<u8>, offset: usize) -> Self {
        Self { column_family, key, offset }
    }

    /// Smallest entry for `(column_family, key)`.
    pub(crate) fn lower_bound(column_family: u32, key: &[u8]) -> Self {
        Self::new(column_family, key.to_vec(), 0)
    }

    /// Largest entry for `(column_family, key)`.
    pub(crate) fn upper_bound(column_family: u32, key: &[u8]) -> Self {
        Self::new(column_family, key.to_vec(), usize::MAX)
    }

    /// Returns the column family id.
    pub fn column_family(&self) -> u32 {
        self.column_family
    }

    /// Returns the user key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Returns the offset of the record in the batch log.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.column_family
            .cmp(&other.column_family)
            .then_with(|| self.key.cmp(&other.key))
            .then_with(|| self.offset.cmp(&other.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_ordering() {
        let mut entries = [
            IndexEntry::new(1, b"a".to_vec(), 10),
            IndexEntry::new(0, b"b".to_vec(), 40),
            IndexEntry::new(0, b"b".to_vec(), 20),
            IndexEntry::new(0, b"a".to_vec(), 30),
        ];
        entries.sort();

        let order: Vec<_> =
            entries.iter().map(|e| (e.column_family(), e.key().to_vec(), e.offset())).collect();
        assert_eq!(
            order,
            vec![
                (0, b"a".to_vec(), 30),
                (0, b"b".to_vec(), 20),
                (0, b"b".to_vec(), 40),
                (1, b"a".to_vec(), 10),
            ]
        );
    }

    #[test]
    fn test_bounds_enclose_key() {
        let entry = IndexEntry::new(3, b"key".to_vec(), 12);
        assert!(IndexEntry::lower_bound(3, b"key") <= entry);
        assert!(IndexEntry::upper_bound(3, b"key") >= entry);
        assert!(IndexEntry::upper_bound(3, b"ke") < entry);
        assert!(IndexEntry::lower_bound(3, b"key\0") > entry);
    }
}
