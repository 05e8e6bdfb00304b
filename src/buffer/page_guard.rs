use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::{BufferPoolManager, FrameHeader};

/// RAII guard for read-only access to a pinned page.
///
/// Holds the page's read latch for its lifetime; dropping it releases the
/// latch first and then unpins the page, so the frame becomes a reclaim
/// candidate exactly when the last guard goes away.
pub struct PageReadGuard<'a> {
    /// Read half of the per-page latch; released before unpinning
    data_guard: Option<RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>>,
    pool: &'a BufferPoolManager,
    frame: &'a FrameHeader,
    page_id: PageId,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPoolManager,
        frame: &'a FrameHeader,
        page_id: PageId,
        data_guard: RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>,
    ) -> Self {
        Self {
            data_guard: Some(data_guard),
            pool,
            frame,
            page_id,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        // Release the latch before unpinning
        self.data_guard.take();
        self.pool.release_frame(self.frame, false);
    }
}

/// RAII guard for exclusive access to a pinned page.
///
/// Taking `data_mut` marks the page dirty; dropping the guard releases the
/// write latch and then unpins, reporting the dirtiness to the pool.
pub struct PageWriteGuard<'a> {
    data_guard: Option<RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>>,
    pool: &'a BufferPoolManager,
    frame: &'a FrameHeader,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPoolManager,
        frame: &'a FrameHeader,
        page_id: PageId,
        data_guard: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>,
    ) -> Self {
        Self {
            data_guard: Some(data_guard),
            pool,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        // Release the latch before unpinning
        self.data_guard.take();
        self.pool.release_frame(self.frame, self.is_dirty);
    }
}
