//! Quarry - the page-caching core of a disk-backed storage engine
//!
//! This crate provides a fixed-capacity buffer pool that mediates all
//! access to fixed-size pages on secondary storage, together with the
//! two structures it is built on: an LRU-K replacer and an extendible
//! hash table.
//!
//! # Architecture
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into frames, tracks dirty state,
//!     orchestrates eviction and writeback
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `Frame`: per-slot metadata and page bytes
//!   - `ReadPageGuard`/`WritePageGuard`: RAII access to pinned pages
//!
//! - **Containers** (`container`): `ExtendibleHashTable`, the
//!   directory-doubling hash table backing the pool's page table
//!
//! - **Storage** (`storage`): `DiskManager`, file-backed page I/O
//!
//! - **Recovery** (`recovery`): `LogManager`, the write-ahead-log hook
//!   the pool accepts but does not yet drive
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry::buffer::BufferPoolManager;
//! use quarry::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("quarry.db").unwrap());
//! let bpm = BufferPoolManager::new(100, 2, disk_manager, None);
//!
//! // Allocate a page and write to it through a guard.
//! let (page_id, frame) = bpm.new_page().unwrap().unwrap();
//! frame.data_mut()[..5].copy_from_slice(b"hello");
//! bpm.unpin_page(page_id, true);
//!
//! // Persist it.
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod recovery;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, QuarryError, Result};
