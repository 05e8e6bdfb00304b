//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use burrow::buffer::BufferPoolManager;
use burrow::common::{BurrowError, PageId};
use burrow::storage::disk::DiskManager;
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(pool_size, dm);
    (bpm, temp_file)
}

#[test]
fn test_buffer_pool_basic_operations() {
    let (bpm, _temp) = create_bpm(10);

    let page_id = {
        let mut guard = bpm.new_page().unwrap();
        guard.data_mut()[0] = 0xDE;
        guard.data_mut()[1] = 0xAD;
        guard.data_mut()[2] = 0xBE;
        guard.data_mut()[3] = 0xEF;
        guard.page_id()
    };
    assert_eq!(page_id, PageId::new(0));

    // Read data back
    let guard = bpm.fetch_page_read(page_id).unwrap();
    assert_eq!(guard.data()[0], 0xDE);
    assert_eq!(guard.data()[1], 0xAD);
    assert_eq!(guard.data()[2], 0xBE);
    assert_eq!(guard.data()[3], 0xEF);
}

#[test]
fn test_buffer_pool_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id;
    let test_data = b"Persistence test data";

    // Write data
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, dm);

        page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[..test_data.len()].copy_from_slice(test_data);
            guard.page_id()
        };

        bpm.flush_page(page_id).unwrap();
    }

    // Read data back with a new BPM
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, dm);

        let guard = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(&guard.data()[..test_data.len()], test_data);
    }
}

#[test]
fn test_buffer_pool_eviction() {
    let (bpm, _temp) = create_bpm(3);

    // Fill the buffer pool
    let mut page_ids = Vec::new();
    for i in 0..3 {
        let mut guard = bpm.new_page().unwrap();
        guard.data_mut()[0] = i as u8;
        page_ids.push(guard.page_id());
    }

    // All pages should be unpinned now
    for &pid in &page_ids {
        assert_eq!(bpm.pin_count(pid), Some(0));
    }

    // Creating a new page evicts the least recently used one
    let new_pid = bpm.new_page().unwrap().page_id();
    assert_eq!(new_pid, PageId::new(3));

    // The evicted page's data should still come back from disk
    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.data()[0], i as u8);
    }
}

#[test]
fn test_buffer_pool_pin_prevents_eviction() {
    let (bpm, _temp) = create_bpm(2);

    let pid0;
    let pid1;
    {
        let guard0 = bpm.new_page().unwrap();
        let guard1 = bpm.new_page().unwrap();
        pid0 = guard0.page_id();
        pid1 = guard1.page_id();

        // Both frames pinned, free list empty
        let result = bpm.new_page();
        assert!(matches!(result, Err(BurrowError::PoolExhausted)));
    }

    // Dropping the guards makes both frames reclaimable again
    assert_eq!(bpm.pin_count(pid0), Some(0));
    assert_eq!(bpm.pin_count(pid1), Some(0));
    bpm.new_page().unwrap();
}

#[test]
fn test_buffer_pool_delete_page() {
    let (bpm, _temp) = create_bpm(10);

    let pid = {
        let mut guard = bpm.new_page().unwrap();
        guard.data_mut()[0] = 42;
        guard.page_id()
    };

    bpm.delete_page(pid).unwrap();

    // The page should no longer be in the buffer pool
    assert_eq!(bpm.pin_count(pid), None);
    assert_eq!(bpm.free_frame_count(), 10);
}

#[test]
fn test_buffer_pool_cannot_delete_pinned_page() {
    let (bpm, _temp) = create_bpm(10);

    let guard = bpm.new_page().unwrap();
    let pid = guard.page_id();

    // Cannot delete while pinned
    let result = bpm.delete_page(pid);
    assert!(matches!(result, Err(BurrowError::PagePinned(_))));
}

#[test]
fn test_buffer_pool_flush_all() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids;

    // Write data to multiple pages
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, dm);

        page_ids = (0..5)
            .map(|i| {
                let mut guard = bpm.new_page().unwrap();
                guard.data_mut()[0] = i as u8;
                guard.page_id()
            })
            .collect::<Vec<_>>();

        bpm.flush_all_pages().unwrap();
    }

    // Read back with new BPM
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, dm);

        for (i, &pid) in page_ids.iter().enumerate() {
            let guard = bpm.fetch_page_read(pid).unwrap();
            assert_eq!(guard.data()[0], i as u8);
        }
    }
}

#[test]
fn test_buffer_pool_concurrent_access() {
    let (bpm, _temp) = create_bpm(10);
    let bpm = Arc::new(bpm);

    // Create a page
    let page_id = bpm.new_page().unwrap().page_id();

    // Spawn multiple reader threads
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = bpm.fetch_page_read(page_id).unwrap();
                    let _ = guard.data()[0]; // Just read
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bpm.pin_count(page_id), Some(0));
}

#[test]
fn test_buffer_pool_concurrent_writers_are_exclusive() {
    let (bpm, _temp) = create_bpm(4);
    let bpm = Arc::new(bpm);

    let page_id = bpm.new_page().unwrap().page_id();

    // Each thread increments the same counter byte under the write latch
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for _ in 0..50 {
                    let mut guard = bpm.fetch_page_write(page_id).unwrap();
                    let current = guard.data()[0];
                    guard.data_mut()[0] = current.wrapping_add(1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let guard = bpm.fetch_page_read(page_id).unwrap();
    assert_eq!(guard.data()[0], 200);
}

#[test]
fn test_buffer_pool_large_workload() {
    let (bpm, _temp) = create_bpm(5); // Small pool to force evictions

    // Create many pages and tag each with its own ID
    let page_ids: Vec<_> = (0..20)
        .map(|_| {
            let mut guard = bpm.new_page().unwrap();
            let pid = guard.page_id();
            guard.data_mut()[..4].copy_from_slice(&pid.as_u32().to_le_bytes());
            pid
        })
        .collect();

    // Read from each page and verify
    for &pid in &page_ids {
        let guard = bpm.fetch_page_read(pid).unwrap();
        let id_bytes: [u8; 4] = guard.data()[..4].try_into().unwrap();
        assert_eq!(u32::from_le_bytes(id_bytes), pid.as_u32());
    }
}

#[test]
fn test_flush_does_not_block_latch_holders() {
    let (bpm, _temp) = create_bpm(4);
    let bpm = Arc::new(bpm);

    let page_id = bpm.new_page().unwrap().page_id();

    // Hold the page's write latch while a flusher targets the same page
    let mut guard = bpm.fetch_page_write(page_id).unwrap();
    guard.data_mut()[0] = 1;

    let flusher = {
        let bpm = Arc::clone(&bpm);
        thread::spawn(move || {
            bpm.flush_page(page_id).unwrap();
        })
    };

    // Give the flusher time to block on the latch. It must be waiting
    // without the pool lock, so the latch holder can still allocate
    thread::sleep(Duration::from_millis(50));
    let other = bpm.new_page().unwrap();
    drop(other);

    drop(guard);
    flusher.join().unwrap();
    assert_eq!(bpm.pin_count(page_id), Some(0));

    let read = bpm.fetch_page_read(page_id).unwrap();
    assert_eq!(read.data()[0], 1);
}

#[test]
fn test_buffer_pool_sharded_instances_share_one_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());

    let bpm0 = BufferPoolManager::new_sharded(4, 2, 0, Arc::clone(&dm));
    let bpm1 = BufferPoolManager::new_sharded(4, 2, 1, Arc::clone(&dm));

    // Instances hand out disjoint page IDs
    let pid0 = bpm0.new_page().unwrap().page_id();
    let pid1 = bpm1.new_page().unwrap().page_id();
    assert_eq!(pid0, PageId::new(0));
    assert_eq!(pid1, PageId::new(1));

    {
        let mut guard = bpm0.fetch_page_write(pid0).unwrap();
        guard.data_mut()[0] = 77;
    }
    bpm0.flush_page(pid0).unwrap();

    // A page flushed by one instance is readable through the other
    let guard = bpm1.fetch_page_read(pid0).unwrap();
    assert_eq!(guard.data()[0], 77);
}
