use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// One slot of the buffer pool: the page bytes plus the bookkeeping that
/// ties a disk page to this frame.
///
/// The `data` lock doubles as the page latch. Guards take it together
/// with a pin, and the pool only evicts frames whose pin count is zero,
/// so a latched frame is never recycled underneath its holder.
pub struct FrameHeader {
    frame_id: FrameId,
    /// Raw ID of the resident page; the invalid sentinel marks a free frame
    page_id: AtomicU32,
    /// Number of active users of this frame
    pin_count: AtomicU32,
    /// Set when the in-memory bytes diverge from disk
    dirty: AtomicBool,
    /// Page bytes (pub(crate) so guards can latch them directly)
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_u32(), Ordering::Release);
    }

    /// Whether this frame currently holds no page.
    pub fn is_free(&self) -> bool {
        self.page_id.load(Ordering::Acquire) == INVALID_PAGE_ID.as_u32()
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    pub fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Drops one pin and returns the remaining count. None if the frame
    /// was not pinned at all; the count never wraps below zero.
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Replaces the frame contents with a freshly read page.
    pub fn load(&self, bytes: &[u8]) {
        assert_eq!(bytes.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(bytes);
    }

    /// Copies the frame contents out, e.g. for a write-back.
    pub fn snapshot(&self, out: &mut [u8]) {
        assert_eq!(out.len(), PAGE_SIZE);
        out.copy_from_slice(&**self.data.read());
    }

    /// Returns the frame to its free state.
    pub fn reset(&self) {
        self.page_id
            .store(INVALID_PAGE_ID.as_u32(), Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
