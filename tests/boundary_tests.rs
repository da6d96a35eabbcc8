// Boundary Condition Tests for the indexed write batch
// These tests verify behavior at edge cases and limits

use indexed_batch::write_batch::HEADER_SIZE;
use indexed_batch::{
    BatchLookup, ColumnFamilyHandle, Error, MemoryStore, Options, ReadOptions, WriteBatch,
    WriteBatchIterator, WriteBatchRecord, WriteBatchWithIndex,
};

/// Test operations on a completely empty batch
#[test]
fn test_empty_batch_operations() {
    let batch = WriteBatchWithIndex::new(0, false);

    assert_eq!(batch.count(), 0);
    assert_eq!(batch.data().len(), HEADER_SIZE);
    assert_eq!(batch.get_from_batch(&Options::default(), b"nonexistent").unwrap(), None);
    assert_eq!(batch.new_iterator().count(), 0);

    let store = MemoryStore::new();
    assert_eq!(batch.get_from_batch_and_db(&store, &ReadOptions::default(), b"k").unwrap(), None);

    // An empty batch commits as a no-op
    store.write(batch.write_batch()).unwrap();
    assert!(store.is_empty());
}

/// Test degenerate serialized data handed to the iterator
#[test]
fn test_iterator_on_degenerate_data() {
    for len in 0..=HEADER_SIZE {
        let data = vec![0u8; len];
        assert_eq!(WriteBatchIterator::new(&data).count(), 0, "len {}", len);
    }
}

/// Test a header whose record count disagrees with the records present
#[test]
fn test_iterator_on_wrong_header_count() {
    let mut batch = WriteBatchWithIndex::new(0, false);
    batch.put(b"k", b"v");
    let mut data = batch.data().to_vec();

    // Count lives in the last four header bytes
    data[HEADER_SIZE - 4] = 2;
    assert_eq!(WriteBatchIterator::new(&data).count(), 0);
    assert!(matches!(WriteBatch::from_data(&data), Err(Error::Corruption(_))));

    data[HEADER_SIZE - 4] = 0;
    assert_eq!(WriteBatchIterator::new(&data).count(), 0);
}

/// Test empty keys and values
#[test]
fn test_empty_key_and_value() {
    let mut batch = WriteBatchWithIndex::new(0, false);
    batch.put(b"", b"");
    assert_eq!(batch.get_from_batch(&Options::default(), b"").unwrap(), Some(Vec::new()));

    // An empty value is a value, not a deletion
    assert_eq!(batch.lookup(b"").unwrap(), BatchLookup::Found(Vec::new()));

    batch.delete(b"");
    assert_eq!(batch.lookup(b"").unwrap(), BatchLookup::Deleted);
}

/// Test large values crossing varint length boundaries
#[test]
fn test_large_value() {
    let large_value = vec![b'v'; 1024 * 1024];
    let large_key = vec![b'k'; 300];

    let mut batch = WriteBatchWithIndex::new(0, true);
    batch.put(&large_key, &large_value);

    let retrieved = batch.get_from_batch(&Options::default(), &large_key).unwrap().unwrap();
    assert_eq!(retrieved.len(), large_value.len());

    let records: Vec<_> = batch.new_iterator().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        records,
        vec![WriteBatchRecord::Put { column_family: 0, key: large_key, value: large_value }]
    );
}

/// Test binary keys that share prefixes
#[test]
fn test_prefix_and_binary_keys() {
    let mut batch = WriteBatchWithIndex::new(0, false);
    batch.put(&[0x00], b"zero");
    batch.put(&[0x00, 0x00], b"two zeros");
    batch.put(&[0xFF], b"max");

    let options = Options::default();
    assert_eq!(batch.get_from_batch(&options, &[0x00]).unwrap(), Some(b"zero".to_vec()));
    assert_eq!(batch.get_from_batch(&options, &[0x00, 0x00]).unwrap(), Some(b"two zeros".to_vec()));
    assert_eq!(batch.get_from_batch(&options, &[0xFF]).unwrap(), Some(b"max".to_vec()));
    assert_eq!(batch.get_from_batch(&options, &[0x00, 0x00, 0x00]).unwrap(), None);
}

/// Test column family ids that need multi-byte varints
#[test]
fn test_large_column_family_id() {
    let cf = ColumnFamilyHandle::new(u32::MAX, "last");
    let mut batch = WriteBatchWithIndex::new(0, false);
    batch.put_cf(&cf, b"k", b"v");

    assert_eq!(batch.get_from_batch_cf(&Options::default(), &cf, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(batch.get_from_batch(&Options::default(), b"k").unwrap(), None);

    let records: Vec<_> = batch.new_iterator().collect::<Result<_, _>>().unwrap();
    assert_eq!(records[0].column_family(), Some(u32::MAX));
}

/// Test range deletes with inverted or empty bounds are logged untouched
#[test]
fn test_degenerate_delete_ranges() {
    let mut batch = WriteBatchWithIndex::new(0, false);
    batch.delete_range(b"z", b"a");
    batch.delete_range(b"", b"");
    assert_eq!(batch.count(), 2);

    let store = MemoryStore::new();
    store.put(b"m", b"v");
    store.write(batch.write_batch()).unwrap();
    assert_eq!(store.get(b"m"), Some(b"v".to_vec()));
}

/// Test many nested save points unwound one by one
#[test]
fn test_deep_save_point_nesting() {
    let mut batch = WriteBatchWithIndex::new(0, true);
    for i in 0..100u32 {
        batch.set_save_point();
        batch.put(b"k", &i.to_le_bytes());
    }

    for i in (0..100u32).rev() {
        assert_eq!(batch.lookup(b"k").unwrap(), BatchLookup::Found(i.to_le_bytes().to_vec()));
        batch.rollback_to_save_point().unwrap();
        assert_eq!(batch.count(), i);
    }

    assert_eq!(batch.lookup(b"k").unwrap(), BatchLookup::NotFound);
    assert!(matches!(batch.rollback_to_save_point(), Err(Error::InvalidState(_))));
}

/// Test a save point set with nothing after it
#[test]
fn test_empty_save_point_rollback() {
    let mut batch = WriteBatchWithIndex::new(0, false);
    batch.put(b"k", b"v");
    let data = batch.data().to_vec();

    batch.set_save_point();
    batch.rollback_to_save_point().unwrap();
    assert_eq!(batch.data(), data.as_slice());
}

/// Test truncated serialized data is rejected by from_data
#[test]
fn test_truncated_data_rejected() {
    let mut batch = WriteBatch::new();
    batch.put(b"key", b"value");
    let data = batch.data();

    for cut in HEADER_SIZE + 1..data.len() {
        assert!(matches!(WriteBatch::from_data(&data[..cut]), Err(Error::Corruption(_))));
    }
}
