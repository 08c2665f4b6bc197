use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolState;
use super::Frame;

/// RAII guard for shared access to a pinned page. Dropping the guard
/// unpins the page, leaving it clean.
pub struct ReadPageGuard {
    page_id: PageId,
    /// Keeps the frame alive for the guard's lifetime
    _frame: Arc<Frame>,
    pool: Arc<PoolState>,
    /// Read latch on the page bytes
    data: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
}

impl ReadPageGuard {
    /// # Safety
    /// The caller must hold a pin on `frame` that this guard takes
    /// ownership of; the data latch is lifetime-erased and relies on
    /// the frame `Arc` to keep the lock alive.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<Frame>, pool: Arc<PoolState>) -> Self {
        let data = frame.data.read();
        let data: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(data);

        Self {
            page_id,
            _frame: frame,
            pool,
            data,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.pool.unpin(self.page_id, false);
    }
}

/// RAII guard for exclusive access to a pinned page. Dropping the guard
/// unpins the page, marking it dirty iff the bytes were borrowed
/// mutably.
pub struct WritePageGuard {
    page_id: PageId,
    _frame: Arc<Frame>,
    pool: Arc<PoolState>,
    /// Write latch on the page bytes; taken out before the unpin runs
    data: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    is_dirty: bool,
}

impl WritePageGuard {
    /// # Safety
    /// Same contract as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<Frame>, pool: Arc<PoolState>) -> Self {
        let data = frame.data.write();
        let data: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(data);

        Self {
            page_id,
            _frame: frame,
            pool,
            data: Some(data),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("guard holds the data latch")[..]
    }

    /// Mutable view of the page bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data.as_mut().expect("guard holds the data latch")[..]
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

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the data latch before taking the pool latch, so a
        // flush waiting on these bytes under the pool latch can proceed.
        self.data.take();
        self.pool.unpin(self.page_id, self.is_dirty);
    }
}
