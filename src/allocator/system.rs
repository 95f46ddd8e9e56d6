//! Default allocator - system heap with per-process statistics

use super::header::BlockHeader;
use super::{AllocatorStats, DebugInfo, MemoryAllocator, DEFAULT_ALIGNMENT};
use crate::logging::{log_allocation, log_deallocation};
use core::ptr::NonNull;
use std::alloc::{alloc, dealloc};
use std::sync::atomic::{AtomicUsize, Ordering};

/// System-heap allocator; the process-wide instance is [`super::default_allocator`]
#[derive(Debug, Default)]
pub struct DefaultMemoryAllocator {
    allocations: AtomicUsize,
    frees: AtomicUsize,
    bytes_in_use: AtomicUsize,
}

impl DefaultMemoryAllocator {
    pub const fn new() -> Self {
        Self {
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            bytes_in_use: AtomicUsize::new(0),
        }
    }

    pub fn stats(&self) -> AllocatorStats {
        let allocations = self.allocations.load(Ordering::Relaxed);
        let frees = self.frees.load(Ordering::Relaxed);
        AllocatorStats {
            allocations,
            frees,
            live_blocks: allocations.saturating_sub(frees),
            bytes_in_use: self.bytes_in_use.load(Ordering::Relaxed),
        }
    }
}

impl MemoryAllocator for DefaultMemoryAllocator {
    fn allocate(&self, size: usize, info: &DebugInfo) -> Option<NonNull<u8>> {
        self.allocate_aligned(size, DEFAULT_ALIGNMENT, info)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        self.free_aligned(ptr)
    }

    fn allocate_aligned(&self, size: usize, align: usize, info: &DebugInfo) -> Option<NonNull<u8>> {
        let layout = BlockHeader::layout_for(size, align)?;

        let base = NonNull::new(unsafe { alloc(layout) })?;
        let user = unsafe { BlockHeader::install(base, layout) };

        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes_in_use.fetch_add(layout.size(), Ordering::Relaxed);
        log_allocation(size, user.as_ptr(), info);

        Some(user)
    }

    unsafe fn free_aligned(&self, ptr: NonNull<u8>) {
        let (base, layout) = BlockHeader::recover(ptr);

        self.frees.fetch_add(1, Ordering::Relaxed);
        self.bytes_in_use.fetch_sub(layout.size(), Ordering::Relaxed);
        log_deallocation(layout.size(), ptr.as_ptr());

        dealloc(base.as_ptr(), layout);
    }
}
