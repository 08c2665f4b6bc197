use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{FrameId, PageId, Result, DEFAULT_BUCKET_SIZE, INVALID_PAGE_ID};
use crate::container::ExtendibleHashTable;
use crate::recovery::LogManager;
use crate::storage::disk::DiskManager;

use super::{Frame, LruKReplacer, ReadPageGuard, WritePageGuard};

/// State coordinated under the buffer pool latch.
struct PoolInner {
    /// Frames not currently holding a page
    free_list: VecDeque<FrameId>,
    /// Monotonic page-id allocator
    next_page_id: u32,
}

/// State shared between the pool and the page guards it hands out.
pub(crate) struct PoolState {
    /// The buffer pool frames
    frames: Vec<Arc<Frame>>,
    /// The pool latch; every public operation serializes on it
    latch: Mutex<PoolInner>,
    /// Page table: maps page IDs to frame IDs
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
    /// Backing store for page bytes
    disk_manager: Arc<DiskManager>,
}

impl PoolState {
    /// Unpin entry point shared by `unpin_page` and the guards.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _inner = self.latch.lock();

        let Some(frame_id) = self.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        let Some(remaining) = frame.unpin() else {
            return false;
        };
        if is_dirty {
            frame.set_dirty(true);
        }
        if remaining == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Secures a frame for a new resident page: the free list first,
    /// otherwise a replacer victim. A dirty victim is written back and
    /// its mapping removed before the frame is handed out. Returns None
    /// when every frame is pinned.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<Option<FrameId>> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.replacer.evict() else {
            return Ok(None);
        };
        let frame = &self.frames[frame_id.as_usize()];
        let victim_page_id = frame.page_id();

        if frame.is_dirty() {
            debug!(page = %victim_page_id, frame = %frame_id, "writing back dirty victim");
            let data = frame.data();
            self.disk_manager.write_page(victim_page_id, &data[..])?;
            drop(data);
            frame.set_dirty(false);
        }
        self.page_table.remove(&victim_page_id);
        frame.reset();

        Ok(Some(frame_id))
    }
}

/// BufferPoolManager mediates all access to disk pages through a fixed
/// set of in-memory frames, evicting with an LRU-K policy and mapping
/// resident pages through an extendible hash table.
///
/// Every public operation serializes on the pool latch, including the
/// synchronous disk I/O done on its behalf; the replacer and page table
/// latches are only ever taken while the pool latch is held, so no lock
/// cycle exists.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state
    state: Arc<PoolState>,
    /// Write-ahead-log hook; accepted but not yet invoked
    _log_manager: Option<Arc<LogManager>>,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames with an LRU-`replacer_k`
    /// replacer over the given disk manager.
    pub fn new(
        pool_size: usize,
        replacer_k: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        assert!(pool_size > 0, "pool size must be positive");

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            latch: Mutex::new(PoolInner {
                free_list,
                next_page_id: 0,
            }),
            page_table: ExtendibleHashTable::new(DEFAULT_BUCKET_SIZE),
            replacer: LruKReplacer::new(replacer_k, pool_size),
            disk_manager,
        });

        Self {
            pool_size,
            state,
            _log_manager: log_manager,
        }
    }

    /// Allocates a fresh page in a free frame, zeroed and pinned to 1.
    /// Returns `Ok(None)` when no frame is free and no frame is
    /// evictable.
    pub fn new_page(&self) -> Result<Option<(PageId, Arc<Frame>)>> {
        let inner = &mut *self.state.latch.lock();

        let Some(frame_id) = self.state.acquire_frame(inner)? else {
            return Ok(None);
        };
        let page_id = PageId::new(inner.next_page_id);
        inner.next_page_id += 1;

        let frame = &self.state.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.pin();

        self.state.page_table.insert(page_id, frame_id)?;
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(Some((page_id, Arc::clone(frame))))
    }

    /// Pins `page_id` into the pool, reading it from disk if it is not
    /// resident. Returns `Ok(None)` for `INVALID_PAGE_ID` or when no
    /// frame can be secured.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<Frame>>> {
        if page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let inner = &mut *self.state.latch.lock();

        if let Some(frame_id) = self.state.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(Some(Arc::clone(frame)));
        }

        let Some(frame_id) = self.state.acquire_frame(inner)? else {
            return Ok(None);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        {
            let mut data = frame.data_mut();
            self.state.disk_manager.read_page(page_id, &mut data[..])?;
        }
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        self.state.page_table.insert(page_id, frame_id)?;
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(Some(Arc::clone(frame)))
    }

    /// Drops one pin on `page_id`, OR-merging `is_dirty` into the
    /// frame's dirty flag; at pin count zero the frame becomes
    /// evictable. Returns false when the page is not resident or was
    /// already unpinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin(page_id, is_dirty)
    }

    /// Writes `page_id`'s bytes to disk and clears its dirty flag,
    /// regardless of pin state. `Ok(false)` when the page is not
    /// resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let _inner = self.state.latch.lock();

        let Some(frame_id) = self.state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        {
            let data = frame.data();
            self.state.disk_manager.write_page(page_id, &data[..])?;
        }
        frame.set_dirty(false);
        Ok(true)
    }

    /// Writes every resident page to disk, clearing dirty flags.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _inner = self.state.latch.lock();

        for frame in &self.state.frames {
            let page_id = frame.page_id();
            if page_id == INVALID_PAGE_ID {
                continue;
            }
            let data = frame.data();
            self.state.disk_manager.write_page(page_id, &data[..])?;
            drop(data);
            frame.set_dirty(false);
        }
        Ok(())
    }

    /// Evicts `page_id` from the pool and releases its id. Returns true
    /// vacuously when the page is not resident, false when it is still
    /// pinned.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        if page_id == INVALID_PAGE_ID {
            return false;
        }
        let inner = &mut *self.state.latch.lock();

        let Some(frame_id) = self.state.page_table.get(&page_id) else {
            return true;
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return false;
        }

        self.state.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        inner.free_list.push_back(frame_id);
        frame.reset();

        self.deallocate_page(page_id);
        true
    }

    /// Fetches `page_id` for shared access; the guard unpins on drop.
    pub fn checked_read_page(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        let Some(frame) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        let guard = unsafe { ReadPageGuard::new(page_id, frame, Arc::clone(&self.state)) };
        Ok(Some(guard))
    }

    /// Fetches `page_id` for exclusive access; the guard unpins on
    /// drop, dirty if the page bytes were borrowed mutably.
    pub fn checked_write_page(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        let Some(frame) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        let guard = unsafe { WritePageGuard::new(page_id, frame, Arc::clone(&self.state)) };
        Ok(Some(guard))
    }

    /// Page-id reclamation is not implemented; freed ids are never
    /// reused.
    fn deallocate_page(&self, _page_id: PageId) {}

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of frames currently on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.state.latch.lock().free_list.len()
    }

    /// Pin count of a resident page, or None if the page is not
    /// resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let _inner = self.state.latch.lock();
        self.state
            .page_table
            .get(&page_id)
            .map(|frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }
}
