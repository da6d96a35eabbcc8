//! Transaction staging example
//!
//! Uses save points to undo part of a staged transaction, merge
//! operators to accumulate counters, and column families to
//! keep unrelated data apart.

use indexed_batch::{
    BatchLookup, ColumnFamilyHandle, MemoryStore, Options, ReadOptions, U64AddOperator,
    WriteBatchWithIndex,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let operator = Arc::new(U64AddOperator);
    let store = MemoryStore::with_merge_operator(operator.clone());
    let counters = ColumnFamilyHandle::new(1, "counters");
    store.put_cf(&counters, b"visits", &10u64.to_le_bytes());

    let mut batch = WriteBatchWithIndex::new(0, false);
    batch.put(b"user:1", b"alice");
    batch.merge_cf(&counters, b"visits", &1u64.to_le_bytes());

    // Speculative work that gets abandoned
    batch.set_save_point();
    batch.put(b"user:2", b"bob");
    batch.merge_cf(&counters, b"visits", &5u64.to_le_bytes());
    println!("Before rollback: {} records", batch.count());
    batch.rollback_to_save_point()?;
    println!("After rollback: {} records", batch.count());

    assert_eq!(batch.lookup(b"user:2")?, BatchLookup::NotFound);

    // Only a merge is staged, so resolving needs the stored base value
    match batch.lookup_cf(&counters, b"visits")? {
        BatchLookup::MergeInProgress(operands) => {
            println!("visits has {} pending operand(s)", operands.len())
        }
        other => println!("visits => {:?}", other),
    }

    let options = Options::new().merge_operator(operator);
    let staged_only = batch.get_from_batch_cf(&options, &counters, b"visits");
    println!("Batch-only read of visits: {:?}", staged_only.map_err(|e| e.to_string()));

    let merged = batch
        .get_from_batch_and_db_cf(&store, &ReadOptions::default(), &counters, b"visits")?
        .map(|bytes| u64::from_le_bytes(bytes.try_into().unwrap_or([0; 8])));
    println!("visits with store => {:?}", merged);

    store.write(batch.write_batch())?;
    let committed = store
        .get_cf(&counters, b"visits")
        .map(|bytes| u64::from_le_bytes(bytes.try_into().unwrap_or([0; 8])));
    println!("visits after commit => {:?}", committed);

    Ok(())
}
