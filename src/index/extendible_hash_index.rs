use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::buffer::BufferPoolManager;
use crate::common::{BurrowError, PageId, RecordId, Result, DIRECTORY_MAX_DEPTH};
use crate::storage::page::{
    BucketInsert, HashBucketPage, HashBucketPageRef, HashDirectoryPage, HashDirectoryPageRef,
};

use super::index_key::{hash_key, IndexKey};

/// A disk-resident extendible hash index built entirely out of pages
/// obtained from the buffer pool: one directory page mapping hash prefixes
/// to bucket pages, which hold the (key, record id) entries.
///
/// Ordinary lookups, inserts, and removes take the table latch for reading;
/// anything that restructures the directory (split, merge) takes it for
/// writing, serializing structural changes against all other activity.
///
/// A split pins the directory plus two bucket pages at once, so the pool
/// must have at least three frames.
pub struct ExtendibleHashIndex<K: IndexKey> {
    bpm: Arc<BufferPoolManager>,
    directory_page_id: PageId,
    /// Table-wide latch guarding the directory structure
    table_latch: RwLock<()>,
    _key: PhantomData<K>,
}

impl<K: IndexKey> ExtendibleHashIndex<K> {
    /// Creates an empty index: a directory at global depth 0 pointing at a
    /// single empty bucket.
    pub fn new(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let directory_page_id;
        {
            let mut dir_guard = bpm.new_page()?;
            directory_page_id = dir_guard.page_id();
            let mut bucket_guard = bpm.new_page()?;
            let bucket_page_id = bucket_guard.page_id();

            let mut dir = HashDirectoryPage::new(dir_guard.data_mut());
            dir.init();
            dir.set_bucket_page_id(0, bucket_page_id);
            dir.set_local_depth(0, 0);

            HashBucketPage::<K>::new(bucket_guard.data_mut()).init();
        }

        Ok(Self {
            bpm,
            directory_page_id,
            table_latch: RwLock::new(()),
            _key: PhantomData,
        })
    }

    /// Reattaches to an existing index given its directory page.
    pub fn open(bpm: Arc<BufferPoolManager>, directory_page_id: PageId) -> Self {
        Self {
            bpm,
            directory_page_id,
            table_latch: RwLock::new(()),
            _key: PhantomData,
        }
    }

    pub fn directory_page_id(&self) -> PageId {
        self.directory_page_id
    }

    /// Point lookup: every value stored under `key`.
    pub fn get_value(&self, key: &K) -> Result<Vec<RecordId>> {
        let _latch = self.table_latch.read();
        let dir_guard = self.bpm.fetch_page_read(self.directory_page_id)?;
        let dir = HashDirectoryPageRef::new(dir_guard.data());

        let bucket_idx = (hash_key(key) & dir.global_depth_mask()) as usize;
        let bucket_page_id = dir.bucket_page_id(bucket_idx);

        let bucket_guard = self.bpm.fetch_page_read(bucket_page_id)?;
        let bucket = HashBucketPageRef::<K>::new(bucket_guard.data());
        Ok(bucket.get_value(key))
    }

    /// Inserts a (key, value) pair, splitting the target bucket as many
    /// times as needed to make room. An identical live pair is rejected
    /// with `DuplicateEntry`. When splitting can no longer make progress
    /// (every entry hashes into one bucket at maximum directory depth) the
    /// insert fails with `DirectoryDepthExhausted`.
    pub fn insert(&self, key: &K, value: RecordId) -> Result<()> {
        // Each round either succeeds or deepens the target bucket by one
        // bit, so the directory's maximum depth bounds the retries.
        for _ in 0..=DIRECTORY_MAX_DEPTH {
            match self.try_insert(key, value)? {
                BucketInsert::Inserted => return Ok(()),
                BucketInsert::Duplicate => return Err(BurrowError::DuplicateEntry),
                BucketInsert::Full => self.split(key)?,
            }
        }
        Err(BurrowError::DirectoryDepthExhausted)
    }

    /// Removes the exact (key, value) pair if present, then merges the
    /// bucket with its split image when the removal (or a miss on an
    /// already-empty bucket) leaves it empty and both buddies sit at the
    /// same local depth.
    pub fn remove(&self, key: &K, value: RecordId) -> Result<bool> {
        let (removed, need_merge) = {
            let _latch = self.table_latch.read();
            let dir_guard = self.bpm.fetch_page_read(self.directory_page_id)?;
            let dir = HashDirectoryPageRef::new(dir_guard.data());

            let bucket_idx = (hash_key(key) & dir.global_depth_mask()) as usize;
            let bucket_page_id = dir.bucket_page_id(bucket_idx);

            let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
            let mut bucket = HashBucketPage::<K>::new(bucket_guard.data_mut());
            let removed = bucket.remove(key, value);

            let local_depth = dir.local_depth(bucket_idx);
            let need_merge = bucket.is_empty()
                && local_depth > 0
                && dir.local_depth(dir.split_image_index(bucket_idx)) == local_depth;
            (removed, need_merge)
        };

        if need_merge {
            self.merge(key)?;
        }
        Ok(removed)
    }

    /// Current global depth of the directory.
    pub fn global_depth(&self) -> Result<u32> {
        let _latch = self.table_latch.read();
        let dir_guard = self.bpm.fetch_page_read(self.directory_page_id)?;
        Ok(HashDirectoryPageRef::new(dir_guard.data()).global_depth())
    }

    /// Panics if the directory violates the extendible hashing invariants.
    pub fn verify_integrity(&self) -> Result<()> {
        let _latch = self.table_latch.read();
        let dir_guard = self.bpm.fetch_page_read(self.directory_page_id)?;
        HashDirectoryPageRef::new(dir_guard.data()).verify_integrity();
        Ok(())
    }

    /// One read-latched insert attempt against the key's current bucket.
    fn try_insert(&self, key: &K, value: RecordId) -> Result<BucketInsert> {
        let _latch = self.table_latch.read();
        let dir_guard = self.bpm.fetch_page_read(self.directory_page_id)?;
        let dir = HashDirectoryPageRef::new(dir_guard.data());

        let bucket_idx = (hash_key(key) & dir.global_depth_mask()) as usize;
        let bucket_page_id = dir.bucket_page_id(bucket_idx);

        let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
        let mut bucket = HashBucketPage::<K>::new(bucket_guard.data_mut());
        Ok(bucket.insert(key, value))
    }

    /// Splits the key's bucket under the exclusive table latch. Doubles the
    /// directory first when the bucket's local depth has caught up with the
    /// global depth, then repoints the half of the bucket's alias set whose
    /// next-higher hash bit differs at a freshly allocated bucket, and
    /// finally redistributes the drained entries under the deeper mask.
    fn split(&self, key: &K) -> Result<()> {
        let _latch = self.table_latch.write();
        let mut dir_guard = self.bpm.fetch_page_write(self.directory_page_id)?;

        let (bucket_idx, bucket_page_id) = {
            let dir = HashDirectoryPageRef::new(dir_guard.data());
            let idx = (hash_key(key) & dir.global_depth_mask()) as usize;
            (idx, dir.bucket_page_id(idx))
        };

        let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;

        // A racing thread may have split this bucket already
        if !HashBucketPageRef::<K>::new(bucket_guard.data()).is_full() {
            return Ok(());
        }

        {
            let dir = HashDirectoryPageRef::new(dir_guard.data());
            if dir.local_depth(bucket_idx) == DIRECTORY_MAX_DEPTH {
                return Err(BurrowError::DirectoryDepthExhausted);
            }
        }

        // Allocate the new bucket before draining the old one, so a pool
        // failure leaves the index untouched
        let mut new_bucket_guard = self.bpm.new_page()?;
        let new_bucket_page_id = new_bucket_guard.page_id();
        HashBucketPage::<K>::new(new_bucket_guard.data_mut()).init();

        let entries = HashBucketPage::<K>::new(bucket_guard.data_mut()).drain_entries();

        let (bucket_idx, local_depth_mask) = {
            let mut dir = HashDirectoryPage::new(dir_guard.data_mut());

            let mut bucket_idx = bucket_idx;
            if dir.local_depth(bucket_idx) == dir.global_depth() {
                dir.incr_global_depth();
                bucket_idx = (hash_key(key) & dir.global_depth_mask()) as usize;
                debug!("directory doubled to global depth {}", dir.global_depth());
            }

            let local_depth = dir.local_depth(bucket_idx);
            let high_bit = 1usize << local_depth;
            let common_bits = bucket_idx & (high_bit - 1);
            let size = dir.size();

            let mut i = common_bits;
            while i < size {
                if (i & high_bit) != (bucket_idx & high_bit) {
                    dir.set_bucket_page_id(i, new_bucket_page_id);
                }
                dir.incr_local_depth(i);
                i += high_bit;
            }

            (bucket_idx, dir.local_depth_mask(bucket_idx) as usize)
        };

        let mut old_bucket = HashBucketPage::<K>::new(bucket_guard.data_mut());
        let mut new_bucket = HashBucketPage::<K>::new(new_bucket_guard.data_mut());
        for (entry_key, entry_value) in entries {
            let idx = (hash_key(&entry_key) as usize) & local_depth_mask;
            let target = if idx == bucket_idx & local_depth_mask {
                &mut old_bucket
            } else {
                &mut new_bucket
            };
            let outcome = target.insert(&entry_key, entry_value);
            assert_eq!(
                outcome,
                BucketInsert::Inserted,
                "bucket overflowed during split redistribution"
            );
        }

        debug!(
            "split {} at slot {}, new bucket {}",
            bucket_page_id, bucket_idx, new_bucket_page_id
        );
        Ok(())
    }

    /// Merges the key's bucket into its split image under the exclusive
    /// table latch, cascading for as long as the merged bucket remains
    /// empty with an equal-depth buddy. The directory latch is held across
    /// the whole cascade, so concurrent operations never observe a
    /// half-merged chain. Orphaned bucket pages are returned to the pool.
    fn merge(&self, key: &K) -> Result<()> {
        let _latch = self.table_latch.write();
        let mut dir_guard = self.bpm.fetch_page_write(self.directory_page_id)?;

        loop {
            let (bucket_idx, bucket_page_id, local_depth, split_image_page_id) = {
                let dir = HashDirectoryPageRef::new(dir_guard.data());
                let bucket_idx = (hash_key(key) & dir.global_depth_mask()) as usize;
                let local_depth = dir.local_depth(bucket_idx);
                if local_depth == 0 {
                    break;
                }
                let split_image_idx = dir.split_image_index(bucket_idx);
                if dir.local_depth(split_image_idx) != local_depth {
                    break;
                }
                (
                    bucket_idx,
                    dir.bucket_page_id(bucket_idx),
                    local_depth,
                    dir.bucket_page_id(split_image_idx),
                )
            };

            let empty = {
                let bucket_guard = self.bpm.fetch_page_read(bucket_page_id)?;
                HashBucketPageRef::<K>::new(bucket_guard.data()).is_empty()
            };
            if !empty {
                break;
            }

            {
                let mut dir = HashDirectoryPage::new(dir_guard.data_mut());

                // Repoint the union of both buddies' alias sets at the
                // surviving bucket and pull every one of them up a level
                let stride = 1usize << (local_depth - 1);
                let start = bucket_idx & (stride - 1);
                let size = dir.size();

                let mut i = start;
                while i < size {
                    dir.set_bucket_page_id(i, split_image_page_id);
                    dir.decr_local_depth(i);
                    i += stride;
                }

                while dir.can_shrink() {
                    dir.decr_global_depth();
                }
            }

            debug!(
                "merged bucket {} into {}",
                bucket_page_id, split_image_page_id
            );

            // The emptied bucket page is unreachable now; reclaim it. A
            // concurrent flush may hold a transient pin, in which case the
            // page is merely left to the file instead of the free list.
            match self.bpm.delete_page(bucket_page_id) {
                Ok(()) | Err(BurrowError::PagePinned(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
