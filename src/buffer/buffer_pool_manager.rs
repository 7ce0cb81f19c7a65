use std::collections::LinkedList;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::common::{BurrowError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::common::PAGE_TABLE_BUCKET_SIZE;
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, PageRelease, ReadPageGuard, WritePageGuard};

/// Internal state shared with page guards
struct PoolState {
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    /// Page table: maps resident page IDs to frame IDs
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
    /// Free frames. The mutex doubles as the pool-wide latch: every
    /// compound operation holds it while touching the table and replacer.
    free_list: Mutex<LinkedList<FrameId>>,
}

impl PoolState {
    /// Decrements a page's pin count, or-assigning the dirty bit; the
    /// frame becomes evictable when the count reaches zero. Returns false
    /// if the page is not resident or was not pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _latch = self.free_list.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        if is_dirty {
            frame.mark_dirty();
        }
        match frame.unpin() {
            Some(0) => {
                self.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
            None => false,
        }
    }
}

impl PageRelease for PoolState {
    fn release(&self, page_id: PageId, is_dirty: bool) {
        self.unpin_page(page_id, is_dirty);
    }
}

/// BufferPoolManager mediates between fixed-size disk pages and in-memory
/// frames. It owns a fixed array of frames, a free list, a page table and
/// an LRU-K replacer, and hands out RAII guards that couple a pin with the
/// page latch.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state
    state: Arc<PoolState>,
    /// Disk scheduler for I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value
    /// for LRU-K, and disk manager.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
            replacer: LruKReplacer::new(k, pool_size),
            free_list: Mutex::new(free_list),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and returns it pinned behind a write guard.
    /// Fails with `BufferPoolFull` when every frame is pinned.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let frame_id = {
            let mut free_list = self.state.free_list.lock();
            let frame_id = self.acquire_frame(&mut free_list)?;
            let frame = &self.state.frames[frame_id.as_usize()];

            let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

            frame.set_page_id(page_id);
            frame.pin();

            self.state.page_table.insert(page_id, frame_id);
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);

            frame_id
        };

        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let page_id = frame.page_id();
        // The data lock is taken outside the pool latch
        let guard = unsafe { WritePageGuard::new(page_id, frame, self.releaser()) };
        Ok(guard)
    }

    /// Fetches a page for read access. Returns `Ok(None)` if the page ID
    /// is not allocated on disk.
    pub fn checked_read_page(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        if page_id == INVALID_PAGE_ID {
            return Err(BurrowError::InvalidPageId(page_id));
        }

        let Some(frame_id) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);

        let guard = unsafe { ReadPageGuard::new(page_id, frame, self.releaser()) };
        Ok(Some(guard))
    }

    /// Fetches a page for write access. Returns `Ok(None)` if the page ID
    /// is not allocated on disk.
    pub fn checked_write_page(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        if page_id == INVALID_PAGE_ID {
            return Err(BurrowError::InvalidPageId(page_id));
        }

        let Some(frame_id) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);

        let guard = unsafe { WritePageGuard::new(page_id, frame, self.releaser()) };
        Ok(Some(guard))
    }

    /// See [`PoolState::unpin_page`]. Exposed for callers that manage
    /// pins without a guard; guard drops funnel through the same path.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin_page(page_id, is_dirty)
    }

    /// Writes a page's current bytes to disk and clears its dirty bit.
    /// Returns `Ok(false)` if the page is not resident or the ID is the
    /// invalid sentinel.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let frame = {
            let _latch = self.state.free_list.lock();
            match self.state.page_table.find(&page_id) {
                Some(frame_id) => Arc::clone(&self.state.frames[frame_id.as_usize()]),
                None => return Ok(false),
            }
        };

        self.flush_frame(&frame, page_id)?;
        Ok(true)
    }

    /// Flushes every resident dirty page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<(Arc<FrameHeader>, PageId)> = {
            let _latch = self.state.free_list.lock();
            self.state
                .frames
                .iter()
                .filter(|f| !f.is_free() && f.is_dirty())
                .map(|f| (Arc::clone(f), f.page_id()))
                .collect()
        };

        for (frame, page_id) in resident {
            self.flush_frame(&frame, page_id)?;
        }
        Ok(())
    }

    /// Copies the frame out and writes it back, outside the pool latch so
    /// a write-latch holder issuing pool calls cannot deadlock against us.
    /// Skips the write if the frame was recycled in the meantime (eviction
    /// already flushed it).
    fn flush_frame(&self, frame: &FrameHeader, page_id: PageId) -> Result<()> {
        let mut data = [0u8; PAGE_SIZE];
        frame.snapshot(&mut data);

        if frame.page_id() != page_id {
            return Ok(());
        }

        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.clear_dirty();
        Ok(())
    }

    /// Deletes a page from the buffer pool and disk. Returns true if the
    /// page is gone afterwards (including when it was not resident);
    /// false if it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut free_list = self.state.free_list.lock();

        let Some(frame_id) = self.state.page_table.find(&page_id) else {
            return true;
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return false;
        }

        self.state.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        free_list.push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id);
        true
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let _latch = self.state.free_list.lock();
        self.state
            .page_table
            .find(&page_id)
            .map(|frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Pins the page into a frame and returns the frame ID, loading from
    /// disk if it is not resident. `Ok(None)` when the page ID is not
    /// allocated on disk.
    fn fetch_page(&self, page_id: PageId) -> Result<Option<FrameId>> {
        let mut free_list = self.state.free_list.lock();

        if let Some(frame_id) = self.state.page_table.find(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(Some(frame_id));
        }

        if !self.disk_scheduler.disk_manager().is_allocated(page_id) {
            return Ok(None);
        }

        let frame_id = self.acquire_frame(&mut free_list)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.load(&data);
        frame.clear_dirty();
        frame.pin();

        self.state.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(Some(frame_id))
    }

    /// Takes a frame from the free list, or evicts a victim. A dirty
    /// victim is written back, and its page table entry is removed before
    /// the caller installs the new one.
    fn acquire_frame(
        &self,
        free_list: &mut MutexGuard<'_, LinkedList<FrameId>>,
    ) -> Result<FrameId> {
        if let Some(frame_id) = free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self
            .state
            .replacer
            .evict()
            .ok_or(BurrowError::BufferPoolFull)?;
        let frame = &self.state.frames[frame_id.as_usize()];
        let evicted_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.snapshot(&mut data);
            self.disk_scheduler
                .schedule_write_sync(evicted_page_id, &data)?;
        }

        self.state.page_table.remove(&evicted_page_id);
        frame.reset();

        Ok(frame_id)
    }

    fn releaser(&self) -> Arc<dyn PageRelease> {
        Arc::clone(&self.state) as Arc<dyn PageRelease>
    }
}
