use std::sync::Arc;

use burrow::buffer::BufferPoolManager;
use burrow::common::DEFAULT_BUFFER_POOL_SIZE;
use burrow::index::ExtendibleHashIndex;
use burrow::storage::disk::DiskManager;
use burrow::{PageId, RecordId, SlotId};

fn main() {
    env_logger::init();

    println!("Burrow - a disk-backed storage engine core");
    println!("==========================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(DEFAULT_BUFFER_POOL_SIZE, disk_manager));
    println!(
        "Created buffer pool manager with {} frames\n",
        DEFAULT_BUFFER_POOL_SIZE
    );

    let index: ExtendibleHashIndex<u64> =
        ExtendibleHashIndex::new(Arc::clone(&bpm)).expect("Failed to create index");
    println!("Created extendible hash index (global depth 0)");

    // Enough keys to force a few bucket splits
    let count = 1000u64;
    for key in 0..count {
        let rid = RecordId::new(PageId::new(key as u32), SlotId::new(0));
        index.insert(&key, rid).expect("Failed to insert");
    }
    println!(
        "Inserted {} keys, global depth is now {}",
        count,
        index.global_depth().expect("Failed to read depth")
    );

    // Point lookups
    for key in [0u64, 499, 999] {
        let values = index.get_value(&key).expect("Failed to look up");
        println!("  key {:>3} -> {:?}", key, values);
    }

    // Remove everything; merges walk the directory back down
    for key in 0..count {
        let rid = RecordId::new(PageId::new(key as u32), SlotId::new(0));
        index.remove(&key, rid).expect("Failed to remove");
    }
    println!(
        "Removed all keys, global depth is now {}",
        index.global_depth().expect("Failed to read depth")
    );

    index.verify_integrity().expect("Integrity check failed");
    bpm.flush_all_pages().expect("Failed to flush");
    println!("\nDirectory verified and all pages flushed");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
