use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::{BurrowError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruReplacer, PageReadGuard, PageWriteGuard};

/// Bookkeeping guarded by the pool-wide lock: the page table, the free
/// list, the eviction policy, and the page id allocator.
struct PoolState {
    /// Maps resident page IDs to the frames backing them
    page_table: HashMap<PageId, FrameId>,
    /// Frames not currently backing any page
    free_list: VecDeque<FrameId>,
    /// LRU tracker over unpinned resident frames
    replacer: LruReplacer,
    /// Next page ID this instance will allocate
    next_page_id: u32,
}

/// BufferPoolManager caches fixed-size disk pages in a fixed arena of
/// frames. It is the only component that talks to the disk collaborator;
/// callers obtain pages through RAII guards that pin the frame for their
/// lifetime and unpin it on drop.
///
/// A single pool-wide mutex serializes all structural operations. It is a
/// correctness-first design: the lock is even held across the flush of an
/// evicted victim (whose latch is necessarily free at pin count zero), but
/// never across a caller's use of a returned page and never across a wait
/// on a page latch someone else may hold.
pub struct BufferPoolManager {
    /// Number of frames in the pool
    pool_size: usize,
    /// Shard count for partitioned page-id allocation
    num_instances: u32,
    /// This instance's shard index
    instance_index: u32,
    /// The frame arena; frames are allocated once and reused
    frames: Vec<FrameHeader>,
    /// Pool-wide lock over the mutable bookkeeping
    state: Mutex<PoolState>,
    /// Disk I/O path
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a single-instance pool with the given number of frames.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self::new_sharded(pool_size, 1, 0, disk_manager)
    }

    /// Creates one instance of a sharded deployment of `num_instances`
    /// parallel pools. Instance `i` only allocates page IDs congruent to
    /// `i mod num_instances`, so callers can route a page ID to its owning
    /// shard with a modulo computation and no coordination.
    pub fn new_sharded(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        assert!(num_instances > 0, "a sharded pool needs at least one instance");
        assert!(
            instance_index < num_instances,
            "instance index {} out of range for {} instances",
            instance_index,
            num_instances
        );

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(FrameHeader::new(frame_id));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            num_instances,
            instance_index,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                replacer: LruReplacer::new(pool_size),
                next_page_id: instance_index,
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and returns it pinned behind a write guard.
    /// The content starts zeroed; nothing is read from disk. Fails with
    /// `PoolExhausted` when every frame is pinned and the free list is
    /// empty.
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let (frame, page_id) = {
            let mut state = self.state.lock();
            let frame_id = self.acquire_frame(&mut state)?;
            let frame = &self.frames[frame_id.as_usize()];

            let page_id = PageId::new(state.next_page_id);
            state.next_page_id += self.num_instances;
            debug_assert_eq!(page_id.as_u32() % self.num_instances, self.instance_index);

            frame.reset();
            frame.set_page_id(page_id);
            frame.pin();
            // The zeroed content exists only in memory until flushed
            frame.set_dirty(true);
            state.page_table.insert(page_id, frame_id);

            trace!("allocated {} in {}", page_id, frame_id);
            (frame, page_id)
        };

        let data_guard = frame.write_data();
        Ok(PageWriteGuard::new(self, frame, page_id, data_guard))
    }

    /// Fetches a page for shared access, reading it from disk if it is not
    /// resident. The returned guard holds the page's read latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame = self.fetch_frame(page_id)?;
        let data_guard = frame.read_data();
        Ok(PageReadGuard::new(self, frame, page_id, data_guard))
    }

    /// Fetches a page for exclusive access, reading it from disk if it is
    /// not resident. The returned guard holds the page's write latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame = self.fetch_frame(page_id)?;
        let data_guard = frame.write_data();
        Ok(PageWriteGuard::new(self, frame, page_id, data_guard))
    }

    /// Writes a resident page back to disk if it is dirty and clears the
    /// dirty flag. Returns `Ok(false)` if the page is not resident,
    /// `Ok(true)` once found whether or not a write happened.
    ///
    /// The frame is pinned and the pool lock released before the page
    /// latch is taken: a flush must never hold the pool against a thread
    /// that holds a latch and calls back in.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(BurrowError::InvalidPageId(page_id));
        }

        let frame = {
            let state = self.state.lock();
            match state.page_table.get(&page_id) {
                Some(&frame_id) => {
                    let frame = &self.frames[frame_id.as_usize()];
                    frame.pin();
                    state.replacer.pin(frame_id);
                    frame
                }
                None => return Ok(false),
            }
        };

        let result = self.flush_frame(frame);
        self.release_frame(frame, false);
        result.map(|()| true)
    }

    /// Flushes every dirty resident page to disk. All resident frames are
    /// pinned up front, then flushed outside the pool lock.
    pub fn flush_all_pages(&self) -> Result<()> {
        let frames: Vec<&FrameHeader> = {
            let state = self.state.lock();
            state
                .page_table
                .values()
                .map(|&frame_id| {
                    let frame = &self.frames[frame_id.as_usize()];
                    frame.pin();
                    state.replacer.pin(frame_id);
                    frame
                })
                .collect()
        };

        let mut result = Ok(());
        for frame in frames {
            if result.is_ok() {
                result = self.flush_frame(frame);
            }
            self.release_frame(frame, false);
        }
        result
    }

    /// Removes a page from the pool and tells the disk collaborator its ID
    /// is reusable. Vacuously succeeds if the page is not resident; fails
    /// with `PagePinned` if it is still in use.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(()),
        };

        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Err(BurrowError::PagePinned(page_id));
        }

        self.flush_frame(frame)?;
        state.page_table.remove(&page_id);
        state.replacer.pin(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
        debug!("deleted {}, {} returned to free list", page_id, frame_id);
        Ok(())
    }

    /// Returns the pin count for a resident page, None otherwise.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Pins the frame backing `page_id`, bringing the page in from disk if
    /// necessary. The caller acquires the page latch after this returns,
    /// outside the pool lock.
    fn fetch_frame(&self, page_id: PageId) -> Result<&FrameHeader> {
        if page_id == INVALID_PAGE_ID {
            return Err(BurrowError::InvalidPageId(page_id));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            frame.pin();
            state.replacer.pin(frame_id);
            return Ok(frame);
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.as_usize()];
        frame.reset();
        frame.set_page_id(page_id);

        {
            let mut data = frame.write_data();
            if let Err(e) = self.disk_scheduler.read_page_sync(page_id, &mut data[..]) {
                drop(data);
                frame.reset();
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        }

        frame.pin();
        state.page_table.insert(page_id, frame_id);
        Ok(frame)
    }

    /// Obtains a frame for a new resident page: the free list strictly
    /// before the replacer, so unused frames are always preferred over
    /// reclaiming one. An evicted dirty victim is flushed before reuse.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = match state.replacer.victim() {
            Some(frame_id) => frame_id,
            None => return Err(BurrowError::PoolExhausted),
        };

        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();
        debug!("evicting {} from {}", old_page_id, frame_id);

        if let Err(e) = self.flush_frame(frame) {
            // Keep the victim resident rather than lose its changes
            state.replacer.unpin(frame_id);
            return Err(e);
        }

        state.page_table.remove(&old_page_id);
        frame.reset();
        Ok(frame_id)
    }

    /// Writes a frame's content to disk if dirty and clears the flag.
    fn flush_frame(&self, frame: &FrameHeader) -> Result<()> {
        if !frame.is_dirty() {
            return Ok(());
        }
        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.write_page_sync(frame.page_id(), &data)?;
        frame.set_dirty(false);
        Ok(())
    }

    /// Called by guards on drop, after they release the page latch:
    /// decrements the pin count and hands the frame to the replacer when
    /// the count reaches zero.
    pub(crate) fn release_frame(&self, frame: &FrameHeader, is_dirty: bool) {
        let state = self.state.lock();
        if is_dirty {
            frame.set_dirty(true);
        }
        let remaining = frame
            .unpin()
            .expect("release of a frame that was never pinned");
        if remaining == 0 {
            state.replacer.unpin(frame.frame_id());
        }
    }
}
