//! Memory allocator - pluggable raw-memory source for objects and control blocks
//!
//! Design: every object-model allocation goes through a [`MemoryAllocator`]
//! reference captured at construction time, and is later returned to that
//! same allocator:
//! 1. Objects and control blocks record the allocator that produced them
//! 2. `free` takes only the pointer; implementations keep their own layout
//! 3. The default allocator is a process-wide static over the system heap
//!
//! Debug info (description, file, line) travels with each request so tracking
//! and allocation logs can name what was allocated.

mod header;
mod system;
mod counting;


pub use header::BlockHeader;
pub use system::DefaultMemoryAllocator;
pub use counting::CountingAllocator;

use core::ptr::NonNull;
use once_cell::sync::Lazy;
use tracing::debug;

/// Alignment used by the unaligned `allocate` entry point
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Source-location annotation attached to allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugInfo {
    pub description: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl DebugInfo {
    /// Placeholder used when the caller supplied nothing
    pub const UNAVAILABLE: DebugInfo = DebugInfo::new("<unavailable>", "<unknown>", 0);

    #[inline]
    pub const fn new(description: &'static str, file: &'static str, line: u32) -> Self {
        Self { description, file, line }
    }
}

impl Default for DebugInfo {
    fn default() -> Self {
        Self::UNAVAILABLE
    }
}

impl std::fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.description, self.file, self.line)
    }
}

/// Capture a [`DebugInfo`] for the call site
#[macro_export]
macro_rules! debug_info {
    ($description:expr) => {
        $crate::allocator::DebugInfo::new($description, file!(), line!())
    };
}

/// Raw memory source
///
/// Implementations must be callable from any thread. A pointer returned by
/// `allocate` is released with `free`, and one returned by `allocate_aligned`
/// with `free_aligned`, on the same allocator instance.
pub trait MemoryAllocator: Send + Sync {
    /// Allocate `size` bytes with [`DEFAULT_ALIGNMENT`]; `None` on exhaustion
    fn allocate(&self, size: usize, info: &DebugInfo) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `allocate` on this allocator and not be freed yet.
    unsafe fn free(&self, ptr: NonNull<u8>);

    /// Allocate `size` bytes aligned to `align` (a power of two)
    fn allocate_aligned(&self, size: usize, align: usize, info: &DebugInfo) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `allocate_aligned` on this allocator and not be
    /// freed yet.
    unsafe fn free_aligned(&self, ptr: NonNull<u8>);
}

/// Snapshot of allocator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub allocations: usize,
    pub frees: usize,
    pub live_blocks: usize,
    pub bytes_in_use: usize,
}

static DEFAULT_ALLOCATOR: Lazy<DefaultMemoryAllocator> = Lazy::new(|| {
    debug!(target: "allocator", "default allocator initialized");
    DefaultMemoryAllocator::new()
});

/// Process-wide default allocator
#[inline]
pub fn default_allocator() -> &'static DefaultMemoryAllocator {
    &DEFAULT_ALLOCATOR
}

/// Initialize allocator subsystem
pub fn init() {
    Lazy::force(&DEFAULT_ALLOCATOR);
}

/// Counters of the default allocator
pub fn stats() -> AllocatorStats {
    DEFAULT_ALLOCATOR.stats()
}
