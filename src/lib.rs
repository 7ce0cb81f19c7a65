//! Burrow - storage engine core of a disk-oriented relational database
//!
//! This crate implements the subsystem that mediates between fixed-size
//! disk pages and in-memory working copies, plus the index structure built
//! on top of it.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): Disk I/O and on-disk page formats
//!   - `DiskManager`: Reads, writes, allocates and deallocates pages
//!   - `DiskScheduler`: Background disk I/O worker
//!   - `HeaderPage`: Page 0, mapping index names to root page IDs
//!
//! - **Containers** (`container`): In-memory concurrent data structures
//!   - `ExtendibleHashTable`: Growing directory of buckets; the buffer
//!     pool's page table
//!
//! - **Buffer Pool** (`buffer`): Frame management for database pages
//!   - `BufferPoolManager`: Pins pages into frames, evicting with LRU-K
//!   - `LruKReplacer`: LRU-K victim selection
//!   - `FrameHeader`: Per-frame metadata and data storage
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pin + latch coupling
//!
//! - **Index** (`index`): Concurrent B+tree with latch crabbing
//!   - `BPlusTree`: Unique-key index over (key, record id) pairs
//!   - `BTreeIterator`: Leaf-chain scans
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use burrow::buffer::BufferPoolManager;
//! use burrow::common::{PageId, RecordId, SlotId};
//! use burrow::common::{DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE};
//! use burrow::index::{BPlusTree, IntegerComparator, Transaction};
//! use burrow::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(100, 2, disk_manager));
//!
//! let tree = BPlusTree::new(
//!     "orders_pk",
//!     bpm,
//!     IntegerComparator,
//!     DEFAULT_LEAF_MAX_SIZE,
//!     DEFAULT_INTERNAL_MAX_SIZE,
//! )
//! .unwrap();
//! let mut txn = Transaction::new();
//!
//! tree.insert(42, RecordId::new(PageId::new(7), SlotId::new(0)), &mut txn).unwrap();
//! assert!(tree.get_value(42).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{BurrowError, FrameId, IndexKey, PageId, RecordId, Result, SlotId};
