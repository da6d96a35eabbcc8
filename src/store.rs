//! Base store contract and an in-memory reference store.
//!
//! The batch only ever reads from a base store through [`BaseStore`]. The
//! [`MemoryStore`] implementation also accepts serialized batches through
//! [`MemoryStore::write`], which is how a committed batch reaches storage.

use crate::column_family::{ColumnFamilyHandle, DEFAULT_COLUMN_FAMILY_ID};
use crate::config::ReadOptions;
use crate::error::{Error, Result};
use crate::merge::MergeOperator;
use crate::write_batch::{Handler, WriteBatch};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Error reported by a base store read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Creates a new store error.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Read access to the persistent store a batch is staged against.
pub trait BaseStore {
    /// Reads `key` from `column_family`. `Ok(None)` means not found.
    fn get(
        &self,
        read_options: &ReadOptions,
        column_family: u32,
        key: &[u8],
    ) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    /// Returns the merge operator configured for `column_family`.
    fn merge_operator(&self, column_family: u32) -> Option<&dyn MergeOperator>;
}

type StoreKey = (u32, Vec<u8>);

/// A thread-safe, in-memory store keyed by (column family, key).
///
/// # Example
///
/// ```rust
/// use indexed_batch::{MemoryStore, WriteBatch};
///
/// # fn main() -> Result<(), indexed_batch::Error> {
/// let store = MemoryStore::new();
/// let mut batch = WriteBatch::new();
/// batch.put(b"key", b"value");
/// store.write(&batch)?;
/// assert_eq!(store.get(b"key"), Some(b"value".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<StoreKey, Vec<u8>>>,
    merge_operator: Option<Arc<dyn MergeOperator>>,
    sequence: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store without a merge operator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that resolves merges with `operator`.
    pub fn with_merge_operator(operator: Arc<dyn MergeOperator>) -> Self {
        Self { merge_operator: Some(operator), ..Self::default() }
    }

    /// Inserts a key-value pair in the default column family.
    pub fn put(&self, key: &[u8], value: &[u8]) {
        self.data.write().insert((DEFAULT_COLUMN_FAMILY_ID, key.to_vec()), value.to_vec());
    }

    /// Inserts a key-value pair in `cf`.
    pub fn put_cf(&self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.data.write().insert((cf.id(), key.to_vec()), value.to_vec());
    }

    /// Removes a key from the default column family.
    pub fn delete(&self, key: &[u8]) {
        self.data.write().remove(&(DEFAULT_COLUMN_FAMILY_ID, key.to_vec()));
    }

    /// Returns the value stored for `key` in the default column family.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(&(DEFAULT_COLUMN_FAMILY_ID, key.to_vec())).cloned()
    }

    /// Returns the value stored for `key` in `cf`.
    pub fn get_cf(&self, cf: &ColumnFamilyHandle, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(&(cf.id(), key.to_vec())).cloned()
    }

    /// Returns the number of stored keys across all column families.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns the last sequence number assigned by `write`.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Applies a serialized batch atomically.
    ///
    /// Either every record is applied or, on the first error, none is.
    /// Returns the sequence number assigned to the first record.
    pub fn write(&self, batch: &WriteBatch) -> Result<u64> {
        let mut data = self.data.write();
        let mut apply = ApplyBatch {
            data: &mut *data,
            merge_operator: self.merge_operator.as_deref(),
            undo: Vec::new(),
        };

        if let Err(e) = batch.iterate(&mut apply) {
            let undo = std::mem::take(&mut apply.undo);
            for (key, previous) in undo.into_iter().rev() {
                match previous {
                    Some(value) => data.insert(key, value),
                    None => data.remove(&key),
                };
            }
            log::warn!("Batch rejected, {} records not applied: {}", batch.count(), e);
            return Err(e);
        }

        let first = self.sequence.fetch_add(u64::from(batch.count()), Ordering::SeqCst) + 1;
        log::debug!(
            "Applied batch: {} records, {} bytes, first sequence {}",
            batch.count(),
            batch.data_size(),
            first
        );
        Ok(first)
    }
}

impl BaseStore for MemoryStore {
    fn get(
        &self,
        read_options: &ReadOptions,
        column_family: u32,
        key: &[u8],
    ) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        if read_options.snapshot.is_some() {
            log::trace!("MemoryStore ignores snapshot reads, serving latest");
        }
        Ok(self.data.read().get(&(column_family, key.to_vec())).cloned())
    }

    fn merge_operator(&self, _column_family: u32) -> Option<&dyn MergeOperator> {
        self.merge_operator.as_deref()
    }
}

struct ApplyBatch<'a> {
    data: &'a mut BTreeMap<StoreKey, Vec<u8>>,
    merge_operator: Option<&'a dyn MergeOperator>,
    undo: Vec<(StoreKey, Option<Vec<u8>>)>,
}

impl ApplyBatch<'_> {
    fn set(&mut self, key: StoreKey, value: Option<Vec<u8>>) {
        let previous = match value {
            Some(value) => self.data.insert(key.clone(), value),
            None => self.data.remove(&key),
        };
        self.undo.push((key, previous));
    }
}

impl Handler for ApplyBatch<'_> {
    fn put_cf(&mut self, column_family: u32, key: &[u8], value: &[u8]) -> Result<()> {
        self.set((column_family, key.to_vec()), Some(value.to_vec()));
        Ok(())
    }

    fn delete_cf(&mut self, column_family: u32, key: &[u8]) -> Result<()> {
        self.set((column_family, key.to_vec()), None);
        Ok(())
    }

    fn merge_cf(&mut self, column_family: u32, key: &[u8], value: &[u8]) -> Result<()> {
        let operator = self
            .merge_operator
            .ok_or_else(|| Error::invalid_argument("Merge operator not configured"))?;
        let store_key = (column_family, key.to_vec());
        let existing = self.data.get(&store_key);
        let merged = operator
            .full_merge(key, existing.map(Vec::as_slice), &[value])
            .map_err(|e| Error::merge_failure(operator.name(), e))?;
        self.set(store_key, Some(merged));
        Ok(())
    }

    fn delete_range_cf(&mut self, column_family: u32, begin: &[u8], end: &[u8]) -> Result<()> {
        if begin >= end {
            return Ok(());
        }
        let doomed: Vec<StoreKey> = self
            .data
            .range((column_family, begin.to_vec())..(column_family, end.to_vec()))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            self.set(key, None);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::AppendOperator;

    #[test]
    fn test_put_get_delete() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.put(b"k", b"v");
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
        assert_eq!(BaseStore::get(&store, &ReadOptions::default(), 0, b"k"), Ok(Some(b"v".to_vec())));

        store.delete(b"k");
        assert_eq!(store.get(b"k"), None);
    }

    #[test]
    fn test_column_families_isolated() {
        let cf = ColumnFamilyHandle::new(1, "meta");
        let store = MemoryStore::new();
        store.put(b"k", b"default");
        store.put_cf(&cf, b"k", b"meta");

        assert_eq!(store.get(b"k"), Some(b"default".to_vec()));
        assert_eq!(store.get_cf(&cf, b"k"), Some(b"meta".to_vec()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_write_applies_all_kinds() {
        let store = MemoryStore::with_merge_operator(Arc::new(AppendOperator::default()));
        store.put(b"b", b"old");
        store.put(b"c", b"old");
        store.put(b"m", b"base");

        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.delete_range(b"b", b"d");
        batch.merge(b"m", b"x");
        batch.put_log_data(b"ignored");
        batch.delete(b"a");
        batch.put(b"z", b"26");

        let first = store.write(&batch).unwrap();
        assert_eq!(first, 1);
        assert_eq!(store.sequence(), 5);

        assert_eq!(store.get(b"a"), None);
        assert_eq!(store.get(b"b"), None);
        assert_eq!(store.get(b"c"), None);
        assert_eq!(store.get(b"m"), Some(b"base,x".to_vec()));
        assert_eq!(store.get(b"z"), Some(b"26".to_vec()));
    }

    #[test]
    fn test_write_is_atomic() {
        let store = MemoryStore::new();
        store.put(b"a", b"before");

        let mut batch = WriteBatch::new();
        batch.put(b"a", b"after");
        batch.put(b"b", b"new");
        // No merge operator configured: this record fails the whole batch
        batch.merge(b"c", b"x");

        assert!(store.write(&batch).is_err());
        assert_eq!(store.get(b"a"), Some(b"before".to_vec()));
        assert_eq!(store.get(b"b"), None);
        assert_eq!(store.sequence(), 0);
    }

    #[test]
    fn test_inverted_range_is_noop() {
        let store = MemoryStore::new();
        store.put(b"m", b"v");

        let mut batch = WriteBatch::new();
        batch.delete_range(b"z", b"a");
        store.write(&batch).unwrap();
        assert_eq!(store.get(b"m"), Some(b"v".to_vec()));
    }
}
