use std::collections::HashMap;

use crate::common::{PageId, DIRECTORY_ARRAY_SIZE, DIRECTORY_MAX_DEPTH, INVALID_PAGE_ID, PAGE_SIZE};

const GLOBAL_DEPTH_OFFSET: usize = 0;
const LOCAL_DEPTHS_OFFSET: usize = 4;
const BUCKET_PAGE_IDS_OFFSET: usize = LOCAL_DEPTHS_OFFSET + DIRECTORY_ARRAY_SIZE;

/// Mutable view over the extendible hash directory page.
///
/// Layout: global depth (u32 LE), then one local depth byte per directory
/// slot, then one bucket page ID (u32 LE) per slot. Only the first
/// `2^global_depth` slots are live; the rest are scratch space reserved for
/// directory doubling up to [`DIRECTORY_MAX_DEPTH`].
pub struct HashDirectoryPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HashDirectoryPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes an empty directory: global depth 0, every slot invalid.
    pub fn init(&mut self) {
        self.data.fill(0);
        for i in 0..DIRECTORY_ARRAY_SIZE {
            self.set_bucket_page_id(i, INVALID_PAGE_ID);
        }
        self.set_global_depth(0);
    }

    pub fn global_depth(&self) -> u32 {
        u32::from_le_bytes(
            self.data[GLOBAL_DEPTH_OFFSET..GLOBAL_DEPTH_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_global_depth(&mut self, depth: u32) {
        assert!(depth <= DIRECTORY_MAX_DEPTH);
        self.data[GLOBAL_DEPTH_OFFSET..GLOBAL_DEPTH_OFFSET + 4]
            .copy_from_slice(&depth.to_le_bytes());
    }

    /// Number of live directory slots (2^global_depth).
    pub fn size(&self) -> usize {
        1 << self.global_depth()
    }

    pub fn global_depth_mask(&self) -> u32 {
        (1 << self.global_depth()) - 1
    }

    /// Doubles the directory. Slot `i + old_size` becomes an alias of slot
    /// `i`, inheriting its bucket page ID and local depth.
    pub fn incr_global_depth(&mut self) {
        let depth = self.global_depth();
        assert!(
            depth < DIRECTORY_MAX_DEPTH,
            "directory cannot grow past max depth {}",
            DIRECTORY_MAX_DEPTH
        );

        let old_size = self.size();
        for i in 0..old_size {
            let page_id = self.bucket_page_id(i);
            let local_depth = self.local_depth(i);
            self.set_bucket_page_id(i + old_size, page_id);
            self.set_local_depth(i + old_size, local_depth);
        }
        self.set_global_depth(depth + 1);
    }

    /// Halves the directory by dropping the upper alias half.
    pub fn decr_global_depth(&mut self) {
        let depth = self.global_depth();
        assert!(depth > 0, "directory is already at depth zero");
        self.set_global_depth(depth - 1);
    }

    pub fn local_depth(&self, idx: usize) -> u32 {
        assert!(idx < DIRECTORY_ARRAY_SIZE);
        self.data[LOCAL_DEPTHS_OFFSET + idx] as u32
    }

    pub fn set_local_depth(&mut self, idx: usize, depth: u32) {
        assert!(idx < DIRECTORY_ARRAY_SIZE);
        assert!(depth <= DIRECTORY_MAX_DEPTH);
        self.data[LOCAL_DEPTHS_OFFSET + idx] = depth as u8;
    }

    pub fn incr_local_depth(&mut self, idx: usize) {
        let depth = self.local_depth(idx);
        self.set_local_depth(idx, depth + 1);
    }

    pub fn decr_local_depth(&mut self, idx: usize) {
        let depth = self.local_depth(idx);
        assert!(depth > 0);
        self.set_local_depth(idx, depth - 1);
    }

    pub fn local_depth_mask(&self, idx: usize) -> u32 {
        (1 << self.local_depth(idx)) - 1
    }

    pub fn bucket_page_id(&self, idx: usize) -> PageId {
        assert!(idx < DIRECTORY_ARRAY_SIZE);
        let offset = BUCKET_PAGE_IDS_OFFSET + idx * 4;
        PageId::new(u32::from_le_bytes(
            self.data[offset..offset + 4].try_into().unwrap(),
        ))
    }

    pub fn set_bucket_page_id(&mut self, idx: usize, page_id: PageId) {
        assert!(idx < DIRECTORY_ARRAY_SIZE);
        let offset = BUCKET_PAGE_IDS_OFFSET + idx * 4;
        self.data[offset..offset + 4].copy_from_slice(&page_id.as_u32().to_le_bytes());
    }

    /// The buddy slot this slot would merge with: the index differing only
    /// in the local depth's distinguishing bit. Requires local depth > 0.
    pub fn split_image_index(&self, idx: usize) -> usize {
        let depth = self.local_depth(idx);
        assert!(depth > 0, "bucket at depth zero has no split image");
        idx ^ (1 << (depth - 1))
    }

    /// True iff the directory can be halved: every live slot's local depth
    /// is strictly below the global depth.
    pub fn can_shrink(&self) -> bool {
        let depth = self.global_depth();
        depth > 0 && (0..self.size()).all(|i| self.local_depth(i) < depth)
    }

    pub fn as_ref(&self) -> HashDirectoryPageRef<'_> {
        HashDirectoryPageRef::new(self.data)
    }
}

/// Read-only view over the directory page.
pub struct HashDirectoryPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HashDirectoryPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn global_depth(&self) -> u32 {
        u32::from_le_bytes(
            self.data[GLOBAL_DEPTH_OFFSET..GLOBAL_DEPTH_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
    }

    pub fn size(&self) -> usize {
        1 << self.global_depth()
    }

    pub fn global_depth_mask(&self) -> u32 {
        (1 << self.global_depth()) - 1
    }

    pub fn local_depth(&self, idx: usize) -> u32 {
        assert!(idx < DIRECTORY_ARRAY_SIZE);
        self.data[LOCAL_DEPTHS_OFFSET + idx] as u32
    }

    pub fn local_depth_mask(&self, idx: usize) -> u32 {
        (1 << self.local_depth(idx)) - 1
    }

    pub fn bucket_page_id(&self, idx: usize) -> PageId {
        assert!(idx < DIRECTORY_ARRAY_SIZE);
        let offset = BUCKET_PAGE_IDS_OFFSET + idx * 4;
        PageId::new(u32::from_le_bytes(
            self.data[offset..offset + 4].try_into().unwrap(),
        ))
    }

    pub fn split_image_index(&self, idx: usize) -> usize {
        let depth = self.local_depth(idx);
        assert!(depth > 0, "bucket at depth zero has no split image");
        idx ^ (1 << (depth - 1))
    }

    pub fn can_shrink(&self) -> bool {
        let depth = self.global_depth();
        depth > 0 && (0..self.size()).all(|i| self.local_depth(i) < depth)
    }

    /// Checks the extendible hashing invariants over the live prefix and
    /// panics with a diagnostic on the first violation:
    /// - every local depth is at most the global depth
    /// - slots aliasing the same bucket page agree on local depth
    /// - each bucket page is referenced by exactly 2^(global - local) slots
    pub fn verify_integrity(&self) {
        let global_depth = self.global_depth();
        let size = self.size();

        let mut alias_counts: HashMap<PageId, (u32, usize)> = HashMap::new();

        for i in 0..size {
            let local_depth = self.local_depth(i);
            assert!(
                local_depth <= global_depth,
                "slot {} has local depth {} above global depth {}",
                i,
                local_depth,
                global_depth
            );

            let page_id = self.bucket_page_id(i);
            assert_ne!(
                page_id, INVALID_PAGE_ID,
                "slot {} references an invalid bucket page",
                i
            );

            let entry = alias_counts.entry(page_id).or_insert((local_depth, 0));
            assert_eq!(
                entry.0, local_depth,
                "bucket page {} is referenced at depths {} and {}",
                page_id, entry.0, local_depth
            );
            entry.1 += 1;
        }

        for (page_id, (local_depth, count)) in alias_counts {
            let expected = 1usize << (global_depth - local_depth);
            assert_eq!(
                count, expected,
                "bucket page {} at depth {} has {} aliases, expected {}",
                page_id, local_depth, count, expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_page(data: &mut [u8]) {
        let mut dir = HashDirectoryPage::new(data);
        dir.init();
        dir.set_bucket_page_id(0, PageId::new(1));
        dir.set_local_depth(0, 0);
    }

    #[test]
    fn test_directory_page_init() {
        let mut data = [0u8; PAGE_SIZE];
        init_page(&mut data);

        let dir = HashDirectoryPageRef::new(&data);
        assert_eq!(dir.global_depth(), 0);
        assert_eq!(dir.size(), 1);
        assert_eq!(dir.bucket_page_id(0), PageId::new(1));
        dir.verify_integrity();
    }

    #[test]
    fn test_directory_page_doubling_duplicates_prefix() {
        let mut data = [0u8; PAGE_SIZE];
        init_page(&mut data);

        let mut dir = HashDirectoryPage::new(&mut data);
        dir.incr_global_depth();

        assert_eq!(dir.global_depth(), 1);
        assert_eq!(dir.size(), 2);
        assert_eq!(dir.bucket_page_id(1), PageId::new(1));
        assert_eq!(dir.local_depth(1), 0);
        dir.as_ref().verify_integrity();
    }

    #[test]
    fn test_directory_page_split_image() {
        let mut data = [0u8; PAGE_SIZE];
        init_page(&mut data);

        let mut dir = HashDirectoryPage::new(&mut data);
        dir.incr_global_depth();
        dir.incr_global_depth();
        dir.set_local_depth(0, 2);
        dir.set_local_depth(2, 2);
        dir.set_local_depth(1, 1);
        dir.set_local_depth(3, 1);

        // depth 2: buddy differs in bit 1
        assert_eq!(dir.split_image_index(0), 2);
        assert_eq!(dir.split_image_index(2), 0);
        // depth 1: buddy differs in bit 0
        assert_eq!(dir.split_image_index(1), 0);
    }

    #[test]
    fn test_directory_page_can_shrink() {
        let mut data = [0u8; PAGE_SIZE];
        init_page(&mut data);

        let mut dir = HashDirectoryPage::new(&mut data);
        assert!(!dir.can_shrink()); // depth zero

        dir.incr_global_depth();
        assert!(dir.can_shrink()); // both slots still at local depth 0

        dir.set_local_depth(0, 1);
        dir.set_local_depth(1, 1);
        assert!(!dir.can_shrink());

        dir.set_local_depth(0, 0);
        dir.set_local_depth(1, 0);
        dir.decr_global_depth();
        assert_eq!(dir.global_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "aliases")]
    fn test_directory_page_integrity_rejects_corrupt_mapping() {
        let mut data = [0u8; PAGE_SIZE];
        init_page(&mut data);

        let mut dir = HashDirectoryPage::new(&mut data);
        dir.incr_global_depth();
        // Claim both slots are fully split but leave them aliased
        dir.set_local_depth(0, 1);
        dir.set_local_depth(1, 1);
        dir.as_ref().verify_integrity();
    }
}
