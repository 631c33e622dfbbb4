//! Walks a table through inserts, a forced bucket overflow, and a resize,
//! printing the monitoring counters at each step.
//!
//! Run with `cargo run --example monitor`.

use bucket_table::BUCKET_CAPACITY;
use bucket_table::Table;
use bucket_table::TableError;

fn report(stage: &str, table: &Table<Vec<u8>>) {
    println!(
        "{stage:>18}: len={:<4} buckets={:<4} capacity={:<5} load={:.3} occupied_buckets={:.3} mem={}B",
        table.len(),
        table.bucket_count(),
        table.capacity(),
        table.load_factor(),
        table.occupied_bucket_fraction(),
        table.memory_usage(Vec::len),
    );
}

fn main() -> Result<(), TableError> {
    let table: Table<Vec<u8>> = Table::new(1)?;
    report("created", &table);

    for i in 0..BUCKET_CAPACITY as u32 {
        table.set(format!("key-{i}").as_bytes(), vec![0u8; 32])?;
    }
    report("filled one bucket", &table);

    match table.set(b"one-too-many", vec![0u8; 32]) {
        Err(TableError::BucketFull) => println!("{:>18}: bucket full, resizing", "overflow"),
        other => panic!("expected BucketFull, got {other:?}"),
    }

    table.resize(64)?;
    report("resized", &table);

    table.set(b"one-too-many", vec![0u8; 32])?;
    report("after retry", &table);

    let removed = table.clear();
    println!("{:>18}: removed {removed} entries", "cleared");
    report("cleared", &table);

    Ok(())
}
