use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::FrameHeader;

/// Receiver for the pin a guard hands back when it goes away. The buffer
/// pool implements this; `is_dirty` reports whether the guard wrote to
/// the page.
pub(crate) trait PageRelease: Send + Sync {
    fn release(&self, page_id: PageId, is_dirty: bool);
}

/// Returns the pin to the pool when dropped.
///
/// Each guard declares this field after its lock field: struct fields
/// drop in declaration order, so the latch is already released by the
/// time the pool sees the unpin. A flusher blocked on the frame's lock
/// while holding the pool latch therefore always gets the lock first.
struct Unpinner {
    pool: Arc<dyn PageRelease>,
    page_id: PageId,
    dirty: bool,
}

impl Drop for Unpinner {
    fn drop(&mut self) {
        self.pool.release(self.page_id, self.dirty);
    }
}

/// Shared-access page guard: holds the page latch (read) and a pin, and
/// gives both back on drop.
pub struct ReadPageGuard {
    // Drop order: latch, then unpin, then the frame backing the latch
    lock: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
    unpinner: Unpinner,
    _frame: Arc<FrameHeader>,
}

impl ReadPageGuard {
    /// # Safety
    /// The lock guard is detached from the frame's lifetime; the `_frame`
    /// Arc stored behind it keeps the frame alive at least as long.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        pool: Arc<dyn PageRelease>,
    ) -> Self {
        let lock = frame.data.read();
        let lock: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(lock);

        Self {
            lock,
            unpinner: Unpinner {
                pool,
                page_id,
                dirty: false,
            },
            _frame: frame,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.unpinner.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.lock[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// Exclusive-access page guard. Writing through `data_mut` marks the
/// page dirty; the bit travels back to the pool with the unpin.
pub struct WritePageGuard {
    // Drop order: latch, then unpin, then the frame backing the latch
    lock: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>,
    unpinner: Unpinner,
    _frame: Arc<FrameHeader>,
}

impl WritePageGuard {
    /// # Safety
    /// Same contract as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        pool: Arc<dyn PageRelease>,
    ) -> Self {
        let lock = frame.data.write();
        let lock: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(lock);

        Self {
            lock,
            unpinner: Unpinner {
                pool,
                page_id,
                dirty: false,
            },
            _frame: frame,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.unpinner.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.lock[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.unpinner.dirty = true;
        &mut self.lock[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}
