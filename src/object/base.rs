//! Counter kinds embedded in managed objects
//!
//! - [`RefCountedBase`]: strong and weak counts live in a control block
//! - [`ObjectBase`]: strong count only, embedded in the object itself
//! - [`DelegatingBase`]: no count at all; the triad goes to an owner object

use super::control::{ControlBlock, TypeInfo, WeakReference};
use super::{tracker, IObject};
use crate::allocator::MemoryAllocator;
use core::ptr::NonNull;
use std::sync::atomic::{fence, AtomicU32, Ordering};
use tracing::trace;

/// Reference counter embedded in a [`super::ManagedObject`]
pub trait RefCounter: Send + Sync + Sized + 'static {
    /// What the construction helper hands over to build the counter
    type Origin: Copy;

    /// # Safety
    /// Only the construction helper creates counters; `origin` must describe
    /// the storage the object is being constructed in.
    #[doc(hidden)]
    unsafe fn from_origin(origin: Self::Origin) -> Self;

    fn add_ref(&self) -> u32;

    /// # Safety
    /// See [`IObject::release`].
    unsafe fn release(&self, pre_destroy: &dyn Fn()) -> u32;

    fn weak_reference(&self) -> Option<WeakReference> {
        None
    }

    /// Object the triad is forwarded to, if any
    fn owner(&self) -> Option<&dyn IObject> {
        None
    }
}

/// Counter of weak-capable objects; forwards to the control block
pub struct RefCountedBase {
    block: NonNull<ControlBlock>,
}

unsafe impl Send for RefCountedBase {}
unsafe impl Sync for RefCountedBase {}

impl RefCountedBase {
    #[inline]
    fn block(&self) -> &ControlBlock {
        unsafe { self.block.as_ref() }
    }

    /// Current strong count (advisory under concurrency)
    pub fn strong_count(&self) -> u32 {
        self.block().num_strong_refs()
    }

    pub fn weak_count(&self) -> u32 {
        self.block().num_weak_refs()
    }
}

impl RefCounter for RefCountedBase {
    type Origin = NonNull<ControlBlock>;

    unsafe fn from_origin(block: NonNull<ControlBlock>) -> Self {
        Self { block }
    }

    #[inline]
    fn add_ref(&self) -> u32 {
        self.block().add_strong_ref()
    }

    #[inline]
    unsafe fn release(&self, pre_destroy: &dyn Fn()) -> u32 {
        // The object holding `self` may be gone once the call returns
        let block = self.block;
        ControlBlock::release_strong_ref(block, pre_destroy)
    }

    fn weak_reference(&self) -> Option<WeakReference> {
        Some(unsafe { WeakReference::new(self.block) })
    }
}

/// Everything needed to destroy and free a strong-only object
#[derive(Clone, Copy)]
pub struct DestroyRecord {
    pub(crate) storage: NonNull<u8>,
    pub(crate) info: TypeInfo,
    pub(crate) allocator: &'static dyn MemoryAllocator,
}

/// Counter of strong-only objects
pub struct ObjectBase {
    strong: AtomicU32,
    record: DestroyRecord,
}

unsafe impl Send for ObjectBase {}
unsafe impl Sync for ObjectBase {}

impl ObjectBase {
    pub fn strong_count(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }

    #[cold]
    unsafe fn destroy(record: DestroyRecord) {
        let object = record.storage.as_ptr();
        tracker::remove(object);
        (record.info.drop)(object);
        record.allocator.free_aligned(record.storage);
        super::record_destroyed();
        trace!(target: "object", ptr = ?object, size = record.info.size, "strong-only object destroyed");
    }
}

impl RefCounter for ObjectBase {
    type Origin = DestroyRecord;

    unsafe fn from_origin(record: DestroyRecord) -> Self {
        Self { strong: AtomicU32::new(1), record }
    }

    #[inline]
    fn add_ref(&self) -> u32 {
        self.strong.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    unsafe fn release(&self, pre_destroy: &dyn Fn()) -> u32 {
        let prev = self.strong.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "released an object with no strong references");

        if prev == 1 {
            fence(Ordering::Acquire);
            pre_destroy();
            let record = self.record;
            Self::destroy(record);
        }
        prev - 1
    }
}

/// Counter of objects that live inside another object and share its count
pub struct DelegatingBase {
    owner: NonNull<dyn IObject>,
}

unsafe impl Send for DelegatingBase {}
unsafe impl Sync for DelegatingBase {}

impl DelegatingBase {
    #[inline]
    fn owner_ref(&self) -> &dyn IObject {
        unsafe { self.owner.as_ref() }
    }
}

impl RefCounter for DelegatingBase {
    type Origin = NonNull<dyn IObject>;

    unsafe fn from_origin(owner: NonNull<dyn IObject>) -> Self {
        Self { owner }
    }

    #[inline]
    fn add_ref(&self) -> u32 {
        self.owner_ref().add_ref()
    }

    #[inline]
    unsafe fn release(&self, _pre_destroy: &dyn Fn()) -> u32 {
        // Releasing the owner may destroy it together with `self`
        let owner = self.owner;
        owner.as_ref().release()
    }

    fn weak_reference(&self) -> Option<WeakReference> {
        self.owner_ref().weak_reference()
    }

    fn owner(&self) -> Option<&dyn IObject> {
        Some(self.owner_ref())
    }
}
