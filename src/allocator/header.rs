//! Block header - layout record prefixed before every allocation
//!
//! `free(ptr)` receives no size, so the default allocator stores the
//! allocation layout in a 16-byte header immediately before the pointer it
//! hands out. The header is always readable at `ptr - BlockHeader::SIZE`.

use core::mem::{align_of, size_of};
use core::ptr::NonNull;
use std::alloc::Layout;

/// Allocation record (16 bytes on all targets)
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Total size of the underlying allocation, header prefix included
    pub size: usize,
    /// Alignment of the underlying allocation; also the prefix length
    pub align: usize,
}

impl BlockHeader {
    pub const SIZE: usize = size_of::<BlockHeader>();

    /// Compute the backing layout for a user request of `size` bytes.
    ///
    /// Returns `None` when the alignment is not a power of two or the total
    /// overflows.
    #[inline]
    pub fn layout_for(size: usize, align: usize) -> Option<Layout> {
        let align = align.max(align_of::<BlockHeader>());
        let total = align.checked_add(size)?;
        Layout::from_size_align(total, align).ok()
    }

    /// Write the header into a fresh allocation and return the user pointer
    ///
    /// # Safety
    /// `base` must come from an allocation made with `layout`.
    #[inline]
    pub unsafe fn install(base: NonNull<u8>, layout: Layout) -> NonNull<u8> {
        let user = base.as_ptr().add(layout.align());
        let header = user.sub(Self::SIZE) as *mut BlockHeader;
        header.write(BlockHeader { size: layout.size(), align: layout.align() });
        NonNull::new_unchecked(user)
    }

    /// Recover the base pointer and layout from a user pointer
    ///
    /// # Safety
    /// `user` must have been returned by [`BlockHeader::install`].
    #[inline]
    pub unsafe fn recover(user: NonNull<u8>) -> (NonNull<u8>, Layout) {
        let header = *(user.as_ptr().sub(Self::SIZE) as *const BlockHeader);
        let base = user.as_ptr().sub(header.align);
        (
            NonNull::new_unchecked(base),
            Layout::from_size_align_unchecked(header.size, header.align),
        )
    }
}
