//! # WriteBatchIndex - Point Lookup Index over a Batch
//!
//! The index maps (column family, key) to the log offsets of the records
//! written for that key.
//!
//! ## Design
//!
//! - Entries live in a crossbeam `SkipSet`, ordered by (cf, key, offset)
//! - Range deletes and log data are never indexed
//! - While a save point is open every mutation is recorded in an undo log,
//!   so rollback costs are proportional to the work done since the save point
//!
//! ## Policies
//!
//! With `overwrite_key` a Put or Delete replaces every live entry of its key,
//! leaving one. A Merge is always stacked as its own entry, since folding it
//! into an earlier value needs the merge operator. So overwrite mode is "at
//! most one live entry per key" only for keys with no Merge after their
//! latest Put or Delete; a key with pending merges holds that terminal entry
//! (if any) plus one entry per merge. Without `overwrite_key` every write is
//! kept.

mod key;

pub use key::IndexEntry;

use crate::write_batch::RecordKind;
use crossbeam_skiplist::SkipSet;

/// One reversible index mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UndoOp {
    Inserted(IndexEntry),
    Removed(IndexEntry),
}

/// Secondary index over the records of a batch.
#[derive(Debug)]
pub struct WriteBatchIndex {
    entries: SkipSet<IndexEntry>,
    overwrite_key: bool,
    undo: Vec<UndoOp>,
    track_undo: bool,
}

impl WriteBatchIndex {
    /// Creates an empty index with the given overwrite policy.
    pub fn new(overwrite_key: bool) -> Self {
        Self { entries: SkipSet::new(), overwrite_key, undo: Vec::new(), track_undo: false }
    }

    /// Returns the overwrite policy.
    pub fn overwrite_key(&self) -> bool {
        self.overwrite_key
    }

    /// Indexes a record of `kind` for `key` written at `offset`.
    ///
    /// Range deletes and log data are ignored.
    pub fn insert(&mut self, kind: RecordKind, column_family: u32, key: &[u8], offset: usize) {
        match kind {
            RecordKind::Put | RecordKind::Delete | RecordKind::Merge => {}
            RecordKind::DeleteRange | RecordKind::LogData => return,
        }

        if self.overwrite_key && kind != RecordKind::Merge {
            let shadowed: Vec<IndexEntry> = self
                .entries
                .range(IndexEntry::lower_bound(column_family, key)..=IndexEntry::upper_bound(column_family, key))
                .map(|entry| entry.value().clone())
                .collect();
            for entry in shadowed {
                log::trace!("Index overwrite: dropping offset {}", entry.offset());
                self.entries.remove(&entry);
                self.record(UndoOp::Removed(entry));
            }
        }

        let entry = IndexEntry::new(column_family, key.to_vec(), offset);
        log::trace!("Index insert: cf={} offset={} kind={:?}", column_family, offset, kind);
        self.entries.insert(entry.clone());
        self.record(UndoOp::Inserted(entry));
    }

    fn record(&mut self, op: UndoOp) {
        if self.track_undo {
            self.undo.push(op);
        }
    }

    /// Returns the live offsets for `(column_family, key)`, oldest first.
    pub fn lookup(&self, column_family: u32, key: &[u8]) -> Vec<usize> {
        self.entries
            .range(IndexEntry::lower_bound(column_family, key)..=IndexEntry::upper_bound(column_family, key))
            .map(|entry| entry.value().offset())
            .collect()
    }

    /// Returns the current undo generation, used as a save point marker.
    pub fn generation(&self) -> usize {
        self.undo.len()
    }

    /// Starts or stops recording undo entries.
    ///
    /// Stopping discards the recorded entries.
    pub fn set_undo_tracking(&mut self, enabled: bool) {
        self.track_undo = enabled;
        if !enabled {
            self.undo.clear();
        }
    }

    /// Reverts every mutation recorded after `generation`.
    pub fn rollback_to(&mut self, generation: usize) {
        let mut reverted = 0usize;
        while self.undo.len() > generation {
            match self.undo.pop() {
                Some(UndoOp::Inserted(entry)) => {
                    self.entries.remove(&entry);
                }
                Some(UndoOp::Removed(entry)) => {
                    self.entries.insert(entry);
                }
                None => break,
            }
            reverted += 1;
        }
        log::trace!("Index rollback reverted {} mutations", reverted);
    }

    /// Removes every entry and any recorded undo history.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.undo.clear();
        self.track_undo = false;
    }

    /// Returns the number of live entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_mode_keeps_all_offsets() {
        let mut index = WriteBatchIndex::new(false);
        index.insert(RecordKind::Put, 0, b"k", 12);
        index.insert(RecordKind::Merge, 0, b"k", 20);
        index.insert(RecordKind::Delete, 0, b"k", 30);

        assert_eq!(index.lookup(0, b"k"), vec![12, 20, 30]);
        assert_eq!(index.entry_count(), 3);
    }

    #[test]
    fn test_overwrite_mode_keeps_latest_terminal() {
        let mut index = WriteBatchIndex::new(true);
        index.insert(RecordKind::Put, 0, b"k", 12);
        index.insert(RecordKind::Put, 0, b"k", 20);
        index.insert(RecordKind::Delete, 0, b"k", 30);

        assert_eq!(index.lookup(0, b"k"), vec![30]);
        assert_eq!(index.entry_count(), 1);
    }

    #[test]
    fn test_overwrite_mode_stacks_merges() {
        let mut index = WriteBatchIndex::new(true);
        index.insert(RecordKind::Put, 0, b"k", 12);
        index.insert(RecordKind::Merge, 0, b"k", 20);
        index.insert(RecordKind::Merge, 0, b"k", 28);
        assert_eq!(index.lookup(0, b"k"), vec![12, 20, 28]);

        index.insert(RecordKind::Put, 0, b"k", 36);
        assert_eq!(index.lookup(0, b"k"), vec![36]);
    }

    #[test]
    fn test_range_delete_not_indexed() {
        let mut index = WriteBatchIndex::new(false);
        index.insert(RecordKind::DeleteRange, 0, b"a", 12);
        index.insert(RecordKind::LogData, 0, b"", 20);
        assert!(index.is_empty());
    }

    #[test]
    fn test_column_families_are_separate() {
        let mut index = WriteBatchIndex::new(true);
        index.insert(RecordKind::Put, 0, b"k", 12);
        index.insert(RecordKind::Put, 1, b"k", 20);

        assert_eq!(index.lookup(0, b"k"), vec![12]);
        assert_eq!(index.lookup(1, b"k"), vec![20]);
        assert!(index.lookup(2, b"k").is_empty());
    }

    #[test]
    fn test_prefix_keys_do_not_collide() {
        let mut index = WriteBatchIndex::new(false);
        index.insert(RecordKind::Put, 0, b"ab", 12);
        index.insert(RecordKind::Put, 0, b"a", 20);
        index.insert(RecordKind::Put, 0, b"abc", 28);

        assert_eq!(index.lookup(0, b"ab"), vec![12]);
        assert_eq!(index.lookup(0, b"a"), vec![20]);
    }

    #[test]
    fn test_rollback_restores_overwritten_entries() {
        let mut index = WriteBatchIndex::new(true);
        index.insert(RecordKind::Put, 0, b"k", 12);

        index.set_undo_tracking(true);
        let generation = index.generation();
        index.insert(RecordKind::Put, 0, b"k", 20);
        index.insert(RecordKind::Put, 0, b"other", 28);
        assert_eq!(index.lookup(0, b"k"), vec![20]);

        index.rollback_to(generation);
        assert_eq!(index.lookup(0, b"k"), vec![12]);
        assert!(index.lookup(0, b"other").is_empty());
        assert_eq!(index.generation(), generation);
    }

    #[test]
    fn test_no_undo_without_tracking() {
        let mut index = WriteBatchIndex::new(false);
        index.insert(RecordKind::Put, 0, b"k", 12);
        assert_eq!(index.generation(), 0);

        index.set_undo_tracking(true);
        index.insert(RecordKind::Put, 0, b"k", 20);
        assert_eq!(index.generation(), 1);

        index.set_undo_tracking(false);
        assert_eq!(index.generation(), 0);
    }
}
