use std::sync::Arc;

use burrow::buffer::BufferPoolManager;
use burrow::common::{PageId, RecordId, SlotId, DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K};
use burrow::index::{BPlusTree, IntegerComparator, Transaction};
use burrow::storage::disk::DiskManager;

fn main() {
    println!("Burrow - storage engine core demo");
    println!("=================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(
        DEFAULT_BUFFER_POOL_SIZE,
        DEFAULT_LRUK_K,
        disk_manager,
    ));
    println!(
        "Created buffer pool manager with {} frames\n",
        bpm.pool_size()
    );

    // Raw page round trip through the pool
    let page_id = {
        let mut guard = bpm.new_page().expect("Failed to allocate page");
        guard.data_mut()[..5].copy_from_slice(b"hello");
        guard.page_id()
    };
    bpm.flush_page(page_id).expect("Failed to flush page");
    println!("Wrote and flushed page {}", page_id);

    // A small index on top of the same pool
    let tree = BPlusTree::new("demo_idx", Arc::clone(&bpm), IntegerComparator, 4, 4)
        .expect("Failed to create index");
    let mut txn = Transaction::new();

    for key in [15u32, 3, 42, 27, 8, 31, 50, 19] {
        let rid = RecordId::new(PageId::new(100 + key), SlotId::new(0));
        tree.insert(key, rid, &mut txn).expect("Insert failed");
        println!("Inserted key {}", key);
    }

    println!("\nScanning in key order:");
    let mut iter = tree.begin().expect("Failed to build iterator");
    while let Some((key, rid)) = iter.next().expect("Scan failed") {
        println!("  {} -> {:?}", key, rid);
    }

    tree.remove(27, &mut txn).expect("Remove failed");
    println!("\nRemoved key 27; lookup now returns {:?}", tree.get_value(27).unwrap());

    bpm.flush_all_pages().expect("Failed to flush");
    println!("Flushed all pages");

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
