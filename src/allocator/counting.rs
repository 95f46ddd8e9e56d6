//! Counting allocator - wraps another allocator and counts its calls
//!
//! Used to prove that construction, destruction and rollback paths release
//! exactly what they acquire.

use super::{DebugInfo, MemoryAllocator};
use core::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct CountingAllocator {
    inner: &'static dyn MemoryAllocator,
    allocations: AtomicUsize,
    frees: AtomicUsize,
}

impl CountingAllocator {
    pub fn new(inner: &'static dyn MemoryAllocator) -> Self {
        Self {
            inner,
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    /// Leak a counting wrapper around the default allocator
    pub fn leaked() -> &'static CountingAllocator {
        Box::leak(Box::new(Self::new(super::default_allocator())))
    }

    #[inline]
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Acquire)
    }

    #[inline]
    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::Acquire)
    }

    /// Allocations not yet returned
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.allocations().saturating_sub(self.frees())
    }
}

impl std::fmt::Debug for CountingAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingAllocator")
            .field("allocations", &self.allocations())
            .field("frees", &self.frees())
            .finish()
    }
}

impl MemoryAllocator for CountingAllocator {
    fn allocate(&self, size: usize, info: &DebugInfo) -> Option<NonNull<u8>> {
        let ptr = self.inner.allocate(size, info)?;
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        self.frees.fetch_add(1, Ordering::AcqRel);
        self.inner.free(ptr)
    }

    fn allocate_aligned(&self, size: usize, align: usize, info: &DebugInfo) -> Option<NonNull<u8>> {
        let ptr = self.inner.allocate_aligned(size, align, info)?;
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Some(ptr)
    }

    unsafe fn free_aligned(&self, ptr: NonNull<u8>) {
        self.frees.fetch_add(1, Ordering::AcqRel);
        self.inner.free_aligned(ptr)
    }
}
