use std::marker::PhantomData;

use crate::common::{RecordId, PAGE_SIZE};
use crate::index::IndexKey;

/// Outcome of a bucket-level insert attempt. Callers must distinguish a
/// duplicate rejection from a full bucket: only the latter warrants a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketInsert {
    Inserted,
    Duplicate,
    Full,
}

/// Number of (key, value) slots a bucket page holds for keys of encoded
/// width `key_size`. Each slot costs one entry plus two bitmap bits.
pub fn bucket_capacity_for(key_size: usize) -> usize {
    4 * PAGE_SIZE / (4 * (key_size + RecordId::ENCODED_SIZE) + 1)
}

/// Mutable view over an extendible hash bucket page.
///
/// Layout: `occupied` bitmap, `readable` bitmap, then a fixed slot array of
/// encoded (key, record id) entries. `occupied[i]` means slot `i` has been
/// written since the bucket's last drain; `readable[i]` means it currently
/// holds a live entry. Slots fill in index order, so probe loops stop at the
/// first unoccupied slot.
pub struct HashBucketPage<'a, K> {
    data: &'a mut [u8],
    _key: PhantomData<K>,
}

impl<'a, K: IndexKey> HashBucketPage<'a, K> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self {
            data,
            _key: PhantomData,
        }
    }

    pub fn capacity() -> usize {
        bucket_capacity_for(K::ENCODED_SIZE)
    }

    fn entry_size() -> usize {
        K::ENCODED_SIZE + RecordId::ENCODED_SIZE
    }

    fn bitmap_bytes() -> usize {
        (Self::capacity() + 7) / 8
    }

    fn entry_offset(idx: usize) -> usize {
        2 * Self::bitmap_bytes() + idx * Self::entry_size()
    }

    /// Zero-fills the page: no slot occupied, no slot readable.
    pub fn init(&mut self) {
        self.data.fill(0);
    }

    pub fn is_occupied(&self, idx: usize) -> bool {
        self.data[idx / 8] & (1 << (idx % 8)) != 0
    }

    fn set_occupied(&mut self, idx: usize) {
        self.data[idx / 8] |= 1 << (idx % 8);
    }

    pub fn is_readable(&self, idx: usize) -> bool {
        self.data[Self::bitmap_bytes() + idx / 8] & (1 << (idx % 8)) != 0
    }

    fn set_readable(&mut self, idx: usize) {
        self.data[Self::bitmap_bytes() + idx / 8] |= 1 << (idx % 8);
    }

    pub fn key_at(&self, idx: usize) -> K {
        let offset = Self::entry_offset(idx);
        K::decode_from(&self.data[offset..offset + K::ENCODED_SIZE])
    }

    pub fn value_at(&self, idx: usize) -> RecordId {
        let offset = Self::entry_offset(idx) + K::ENCODED_SIZE;
        RecordId::decode_from(&self.data[offset..offset + RecordId::ENCODED_SIZE])
    }

    fn set_entry(&mut self, idx: usize, key: &K, value: RecordId) {
        let offset = Self::entry_offset(idx);
        key.encode_to(&mut self.data[offset..offset + K::ENCODED_SIZE]);
        value.encode_to(
            &mut self.data
                [offset + K::ENCODED_SIZE..offset + K::ENCODED_SIZE + RecordId::ENCODED_SIZE],
        );
    }

    /// Collects every live value stored under `key`.
    pub fn get_value(&self, key: &K) -> Vec<RecordId> {
        let mut results = Vec::new();
        let capacity = Self::capacity();
        for i in 0..capacity {
            if !self.is_occupied(i) {
                break;
            }
            if self.is_readable(i) && self.key_at(i) == *key {
                results.push(self.value_at(i));
            }
        }
        results
    }

    /// Inserts (key, value) into the first reusable slot: the first
    /// tombstone seen during the scan, else the first unoccupied slot.
    /// An identical live pair is rejected, and a bucket with neither a
    /// tombstone nor an unoccupied slot reports itself full.
    pub fn insert(&mut self, key: &K, value: RecordId) -> BucketInsert {
        let capacity = Self::capacity();
        let mut free_slot = None;
        let mut i = 0;
        while i < capacity && self.is_occupied(i) {
            if self.is_readable(i) {
                if self.key_at(i) == *key && self.value_at(i) == value {
                    return BucketInsert::Duplicate;
                }
            } else if free_slot.is_none() {
                free_slot = Some(i);
            }
            i += 1;
        }

        let slot = match free_slot {
            Some(slot) => slot,
            None if i < capacity => i,
            None => return BucketInsert::Full,
        };

        self.set_entry(slot, key, value);
        self.set_occupied(slot);
        self.set_readable(slot);
        BucketInsert::Inserted
    }

    /// Tombstones the first live slot matching both key and value exactly.
    /// Returns whether a match was found.
    pub fn remove(&mut self, key: &K, value: RecordId) -> bool {
        let capacity = Self::capacity();
        for i in 0..capacity {
            if !self.is_occupied(i) {
                break;
            }
            if self.is_readable(i) && self.key_at(i) == *key && self.value_at(i) == value {
                self.remove_at(i);
                return true;
            }
        }
        false
    }

    /// Clears the readable bit, leaving the slot as a tombstone.
    pub fn remove_at(&mut self, idx: usize) {
        self.data[Self::bitmap_bytes() + idx / 8] &= !(1 << (idx % 8));
    }

    pub fn num_readable(&self) -> usize {
        self.data[Self::bitmap_bytes()..2 * Self::bitmap_bytes()]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum()
    }

    pub fn is_full(&self) -> bool {
        self.num_readable() == Self::capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.data[Self::bitmap_bytes()..2 * Self::bitmap_bytes()]
            .iter()
            .all(|&b| b == 0)
    }

    /// Drains every live (key, value) pair and resets both bitmaps. This is
    /// the only operation that clears `occupied`; it prepares the bucket to
    /// be refilled as one half of a post-split pair.
    pub fn drain_entries(&mut self) -> Vec<(K, RecordId)> {
        let capacity = Self::capacity();
        let mut entries = Vec::new();
        for i in 0..capacity {
            if !self.is_occupied(i) {
                break;
            }
            if self.is_readable(i) {
                entries.push((self.key_at(i), self.value_at(i)));
            }
        }
        self.data[..2 * Self::bitmap_bytes()].fill(0);
        entries
    }
}

/// Read-only view over a bucket page.
pub struct HashBucketPageRef<'a, K> {
    data: &'a [u8],
    _key: PhantomData<K>,
}

impl<'a, K: IndexKey> HashBucketPageRef<'a, K> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self {
            data,
            _key: PhantomData,
        }
    }

    pub fn capacity() -> usize {
        bucket_capacity_for(K::ENCODED_SIZE)
    }

    fn bitmap_bytes() -> usize {
        (Self::capacity() + 7) / 8
    }

    fn entry_offset(idx: usize) -> usize {
        2 * Self::bitmap_bytes() + idx * (K::ENCODED_SIZE + RecordId::ENCODED_SIZE)
    }

    pub fn is_occupied(&self, idx: usize) -> bool {
        self.data[idx / 8] & (1 << (idx % 8)) != 0
    }

    pub fn is_readable(&self, idx: usize) -> bool {
        self.data[Self::bitmap_bytes() + idx / 8] & (1 << (idx % 8)) != 0
    }

    pub fn key_at(&self, idx: usize) -> K {
        let offset = Self::entry_offset(idx);
        K::decode_from(&self.data[offset..offset + K::ENCODED_SIZE])
    }

    pub fn value_at(&self, idx: usize) -> RecordId {
        let offset = Self::entry_offset(idx) + K::ENCODED_SIZE;
        RecordId::decode_from(&self.data[offset..offset + RecordId::ENCODED_SIZE])
    }

    pub fn get_value(&self, key: &K) -> Vec<RecordId> {
        let mut results = Vec::new();
        let capacity = Self::capacity();
        for i in 0..capacity {
            if !self.is_occupied(i) {
                break;
            }
            if self.is_readable(i) && self.key_at(i) == *key {
                results.push(self.value_at(i));
            }
        }
        results
    }

    pub fn num_readable(&self) -> usize {
        self.data[Self::bitmap_bytes()..2 * Self::bitmap_bytes()]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum()
    }

    pub fn is_full(&self) -> bool {
        self.num_readable() == Self::capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.data[Self::bitmap_bytes()..2 * Self::bitmap_bytes()]
            .iter()
            .all(|&b| b == 0)
    }
}
