//! Basic usage example for indexed-batch
//!
//! This example demonstrates the fundamental operations:
//! - Staging writes in an indexed batch
//! - Reading staged values back before commit
//! - Committing the batch to a store

use indexed_batch::{MemoryStore, Options, ReadOptions, WriteBatchWithIndex};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let store = MemoryStore::new();
    store.put(b"key2", b"committed");

    // Overwrite mode keeps a single index entry per key
    let mut batch = WriteBatchWithIndex::new(4 * 1024, true);

    println!("Staging writes...");
    batch.put(b"key1", b"value1");
    batch.put(b"key1", b"value1-updated");
    batch.delete(b"key2");
    batch.put(b"key3", b"value3");

    println!("Reading staged data...");
    let options = Options::default();
    if let Some(value) = batch.get_from_batch(&options, b"key1")? {
        println!("key1 => {:?}", String::from_utf8_lossy(&value));
    }

    let read_options = ReadOptions::default();
    match batch.get_from_batch_and_db(&store, &read_options, b"key2")? {
        Some(value) => println!("key2 => {:?}", String::from_utf8_lossy(&value)),
        None => println!("key2 is deleted in the batch"),
    }

    println!(
        "Batch holds {} records in {} bytes",
        batch.count(),
        batch.data_size()
    );

    for record in batch.new_iterator() {
        println!("  {:?}", record?);
    }

    let sequence = store.write(batch.write_batch())?;
    println!("Committed at sequence {}", sequence);
    println!("Store now holds {} keys", store.len());

    batch.destroy();
    Ok(())
}
