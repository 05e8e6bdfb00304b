//! Burrow - a disk-backed storage engine core in Rust
//!
//! The engine caches fixed-size disk pages in a buffer pool and builds a
//! disk-resident extendible hash index on top of it.
//!
//! # Architecture
//!
//! The system is organized into three layers:
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `DiskManager`: Reads and writes pages to/from disk
//!   - `DiskScheduler`: Asynchronous disk I/O scheduling
//!   - `HashDirectoryPage`: Directory mapping hash prefixes to buckets
//!   - `HashBucketPage`: Bucket storage for (key, record id) entries
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: Fetches pages from disk and caches them in memory
//!   - `LruReplacer`: LRU page replacement policy
//!   - `FrameHeader`: Per-frame metadata and data storage
//!   - `PageReadGuard`/`PageWriteGuard`: RAII guards for thread-safe page access
//!
//! - **Index** (`index`): The extendible hash index
//!   - `ExtendibleHashIndex`: Non-unique hash index with bucket splits,
//!     directory doubling, merges, and directory shrinking
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use burrow::buffer::BufferPoolManager;
//! use burrow::index::ExtendibleHashIndex;
//! use burrow::storage::disk::DiskManager;
//! use burrow::{PageId, RecordId, SlotId};
//!
//! // Create a disk manager for a database file
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//!
//! // Create a buffer pool with 100 frames
//! let bpm = Arc::new(BufferPoolManager::new(100, disk_manager));
//!
//! // Build an index over u64 keys and point a key at a record
//! let index: ExtendibleHashIndex<u64> = ExtendibleHashIndex::new(bpm).unwrap();
//! let rid = RecordId::new(PageId::new(7), SlotId::new(3));
//! index.insert(&42, rid).unwrap();
//! assert_eq!(index.get_value(&42).unwrap(), vec![rid]);
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{BurrowError, PageId, RecordId, Result, SlotId};
