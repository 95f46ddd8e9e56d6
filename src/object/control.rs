//! Control block - strong/weak counts and the lifetime state machine
//!
//! States move one way: `NotInitialized -> Alive -> Destroyed`.
//!
//! - The strong count starts at 1 (the creator's implicit reference) and the
//!   weak count at 0.
//! - `add_strong_ref`/`release_strong_ref` are lock-free.
//! - `query_object`, the destroy transition and `release_weak_ref` run under
//!   the spin lock. Destructors and pre-destroy hooks run unlocked.
//! - The object is destroyed once, when the strong count goes 1 -> 0.
//! - The block is freed once, when the weak count goes 1 -> 0 while the state
//!   is `Destroyed`.

use super::dispatch::InterfaceSlot;
use super::{tracker, IObject, Interface, ManagedObject};
use crate::allocator::{DebugInfo, MemoryAllocator};
use crate::guid::Guid;
use crate::ptr::AutoPtr;
use crate::status::{ObjectError, Result};
use crate::sync::SpinLock;
use core::cell::UnsafeCell;
use core::mem::{align_of, size_of, MaybeUninit};
use core::ptr::{self, NonNull};
use std::fmt;
use std::sync::atomic::{fence, AtomicU32, AtomicU8, Ordering};
use tracing::{debug, trace};

/// Size, alignment and destructor of an erased object type
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub size: usize,
    pub align: usize,
    pub name: &'static str,
    pub drop: unsafe fn(*mut u8),
}

unsafe fn drop_erased<T>(object: *mut u8) {
    ptr::drop_in_place(object as *mut T);
}

impl TypeInfo {
    pub fn of<T>() -> Self {
        Self {
            size: size_of::<T>(),
            align: align_of::<T>(),
            name: std::any::type_name::<T>(),
            drop: drop_erased::<T>,
        }
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectState {
    NotInitialized = 0,
    Alive = 1,
    Destroyed = 2,
}

impl ObjectState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotInitialized,
            1 => Self::Alive,
            _ => Self::Destroyed,
        }
    }
}

/// Where the object lives relative to its control block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayout {
    /// One allocation holds the block followed by the object
    Packed,
    /// Block and object are allocated separately
    Separate,
}

/// Type-erased handle the block uses to query and destroy its object
struct ObjectWrapper {
    object: NonNull<dyn IObject>,
    info: TypeInfo,
    pre_destroy: unsafe fn(*const u8),
}

unsafe fn pre_destroy_erased<T: ManagedObject>(object: *const u8) {
    (*(object as *const T)).pre_destroy();
}

impl ObjectWrapper {
    #[inline]
    fn storage(&self) -> *mut u8 {
        self.object.as_ptr() as *mut u8
    }
}

pub struct ControlBlock {
    strong: AtomicU32,
    weak: AtomicU32,
    state: AtomicU8,
    lock: SpinLock<()>,
    wrapper: UnsafeCell<Option<ObjectWrapper>>,
    allocator: &'static dyn MemoryAllocator,
    layout: BlockLayout,
    info: DebugInfo,
}

unsafe impl Send for ControlBlock {}
unsafe impl Sync for ControlBlock {}

/// Control block and object storage sharing one allocation
#[repr(C)]
pub(crate) struct PackedBlock<T> {
    pub(crate) block: ControlBlock,
    pub(crate) object: MaybeUninit<T>,
}

impl ControlBlock {
    pub(crate) fn new(
        allocator: &'static dyn MemoryAllocator,
        layout: BlockLayout,
        info: DebugInfo,
    ) -> Self {
        Self {
            strong: AtomicU32::new(1),
            weak: AtomicU32::new(0),
            state: AtomicU8::new(ObjectState::NotInitialized as u8),
            lock: SpinLock::new(()),
            wrapper: UnsafeCell::new(None),
            allocator,
            layout,
            info,
        }
    }

    /// Bind the constructed object: `NotInitialized -> Alive`
    ///
    /// # Safety
    /// `object` must be fully constructed and owned by this block.
    pub(crate) unsafe fn attach<T: ManagedObject>(&self, object: NonNull<T>) {
        debug_assert_eq!(self.state(), ObjectState::NotInitialized, "control block attached twice");

        let object: NonNull<dyn IObject> = object;
        *self.wrapper.get() = Some(ObjectWrapper {
            object,
            info: TypeInfo::of::<T>(),
            pre_destroy: pre_destroy_erased::<T>,
        });
        self.state.store(ObjectState::Alive as u8, Ordering::Release);

        debug!(
            target: "control_block",
            block = ?(self as *const Self),
            object = ?object.as_ptr(),
            layout = ?self.layout,
            description = self.info.description,
            "object attached"
        );
    }

    #[inline]
    pub fn state(&self) -> ObjectState {
        ObjectState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn num_strong_refs(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }

    #[inline]
    pub fn num_weak_refs(&self) -> u32 {
        self.weak.load(Ordering::Acquire)
    }

    /// True while the object has owners and has not been destroyed
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.num_strong_refs() > 0 && self.state() == ObjectState::Alive
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        !self.is_alive()
    }

    #[inline]
    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn debug_info(&self) -> DebugInfo {
        self.info
    }

    /// Caller must already own a strong reference
    #[inline]
    pub fn add_strong_ref(&self) -> u32 {
        debug_assert_eq!(self.state(), ObjectState::Alive, "strong reference to a dead object");
        self.strong.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Drop a strong reference; the 1 -> 0 transition destroys the object
    ///
    /// # Safety
    /// The caller must own the reference it releases. `this` may be freed
    /// when the call returns.
    pub(crate) unsafe fn release_strong_ref(this: NonNull<Self>, pre_destroy: &dyn Fn()) -> u32 {
        let prev = this.as_ref().strong.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "released an object with no strong references");

        if prev == 1 {
            fence(Ordering::Acquire);
            pre_destroy();
            Self::try_destroy_object(this);
        }
        prev - 1
    }

    #[inline]
    pub(crate) fn add_weak_ref(&self) -> u32 {
        self.weak.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Drop a weak reference; frees the block when it was the last one and
    /// the object is already gone
    ///
    /// # Safety
    /// The caller must own the weak reference it releases.
    pub(crate) unsafe fn release_weak_ref(this: NonNull<Self>) -> u32 {
        let block = this.as_ref();
        let guard = block.lock.lock();
        let prev = block.weak.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "released a control block with no weak references");
        let destroy = prev == 1 && block.state() == ObjectState::Destroyed;
        drop(guard);

        if destroy {
            Self::self_destroy(this);
        }
        prev - 1
    }

    /// Weak release used by the destroy transition for its provisional unit
    unsafe fn release_weak_ref_lock_free(this: NonNull<Self>) {
        if this.as_ref().weak.fetch_sub(1, Ordering::AcqRel) == 1 {
            Self::self_destroy(this);
        }
    }

    /// Resolve `iid` on the object if, and only if, it still has an owner
    ///
    /// A probe reference is taken under the lock. The object only counts as
    /// alive when the count after the probe exceeds 1, so a query never
    /// reaches an object whose last owner has already let go.
    ///
    /// The caller must hold a weak reference to this block.
    pub fn query_object(&self, iid: &Guid, slot: &mut InterfaceSlot<'_>) -> Result<()> {
        if self.state() != ObjectState::Alive {
            slot.clear();
            super::record_failed_query();
            return Err(ObjectError::NotAlive);
        }

        let guard = self.lock.lock();
        let probed = self.strong.fetch_add(1, Ordering::Acquire) + 1;

        let mut orphaned = None;
        let result = if probed > 1 && self.state() == ObjectState::Alive {
            // Only written by attach and the destroy transition, which needs the lock
            let wrapper = unsafe { &*self.wrapper.get() };
            match wrapper {
                Some(wrapper) => {
                    orphaned = Some((wrapper.pre_destroy, wrapper.storage()));
                    unsafe { wrapper.object.as_ref() }.query_interface(iid, slot)
                }
                None => Err(ObjectError::NotAlive),
            }
        } else {
            Err(ObjectError::NotAlive)
        };

        let prev = self.strong.fetch_sub(1, Ordering::Release);
        drop(guard);

        if result.is_err() {
            slot.clear();
            super::record_failed_query();
        }

        // The last owner let go while the probe was held, so the probe
        // finishes the destruction it deferred. A member route can succeed
        // without adding a reference on this object.
        if prev == 1 && probed > 1 {
            if let Some((pre_destroy, storage)) = orphaned {
                fence(Ordering::Acquire);
                unsafe {
                    pre_destroy(storage);
                    Self::try_destroy_object(NonNull::from(self));
                }
            }
        }
        result
    }

    /// Destroy transition run by whoever released the last strong reference
    #[cold]
    unsafe fn try_destroy_object(this: NonNull<Self>) {
        let block = this.as_ref();

        let wrapper = {
            let _guard = block.lock.lock();
            debug_assert_eq!(block.strong.load(Ordering::Relaxed), 0, "destroying an owned object");
            debug_assert_eq!(block.state(), ObjectState::Alive, "destroying a dead object");
            if block.state() != ObjectState::Alive {
                return;
            }

            let wrapper = (*block.wrapper.get()).take();
            block.state.store(ObjectState::Destroyed as u8, Ordering::Release);

            // Keeps the block valid while the destructor runs unlocked, even
            // if it drops the last outside weak reference to this block
            block.weak.fetch_add(1, Ordering::Relaxed);
            wrapper
        };

        if let Some(wrapper) = wrapper {
            let storage = wrapper.storage();
            tracker::remove(storage);
            (wrapper.info.drop)(storage);
            if block.layout == BlockLayout::Separate {
                block.allocator.free_aligned(NonNull::new_unchecked(storage));
            }
            super::record_destroyed();
            trace!(
                target: "control_block",
                block = ?this.as_ptr(),
                object = ?storage,
                ty = wrapper.info.name,
                "object destroyed"
            );
        }

        Self::release_weak_ref_lock_free(this);
    }

    /// Undo a construction whose constructor failed
    ///
    /// The block never becomes alive. Weak references that escaped the
    /// constructor keep it allocated until the last of them is released.
    ///
    /// # Safety
    /// The object storage must not hold a live value.
    pub(crate) unsafe fn abandon(this: NonNull<Self>) {
        let block = this.as_ref();
        let weak = {
            let _guard = block.lock.lock();
            block.strong.store(0, Ordering::Release);
            block.state.store(ObjectState::Destroyed as u8, Ordering::Release);
            block.weak.load(Ordering::Acquire)
        };

        debug!(target: "control_block", block = ?this.as_ptr(), weak, "construction rolled back");
        if weak == 0 {
            Self::self_destroy(this);
        }
    }

    #[cold]
    unsafe fn self_destroy(this: NonNull<Self>) {
        let allocator = this.as_ref().allocator;
        ptr::drop_in_place(this.as_ptr());
        allocator.free_aligned(this.cast());
        super::record_block_freed();
        trace!(target: "control_block", block = ?this.as_ptr(), "control block freed");
    }
}

impl fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("strong", &self.num_strong_refs())
            .field("weak", &self.num_weak_refs())
            .field("state", &self.state())
            .field("layout", &self.layout)
            .finish()
    }
}

/// Owning weak reference to a control block
///
/// Holds one weak unit: the block stays allocated while the handle exists,
/// but the object may be destroyed at any time.
pub struct WeakReference {
    block: NonNull<ControlBlock>,
}

unsafe impl Send for WeakReference {}
unsafe impl Sync for WeakReference {}

impl WeakReference {
    /// # Safety
    /// `block` must be a live control block.
    pub(crate) unsafe fn new(block: NonNull<ControlBlock>) -> Self {
        block.as_ref().add_weak_ref();
        Self { block }
    }

    #[inline]
    fn block(&self) -> &ControlBlock {
        unsafe { self.block.as_ref() }
    }

    /// See [`ControlBlock::query_object`]
    pub fn query_object(&self, iid: &Guid, slot: &mut InterfaceSlot<'_>) -> Result<()> {
        self.block().query_object(iid, slot)
    }

    /// Obtain a strong pointer to capability `I` if the object is alive
    pub fn resolve<I: ?Sized + Interface + IObject>(&self) -> Option<AutoPtr<I>> {
        let mut out: Option<NonNull<I>> = None;
        {
            let mut slot = InterfaceSlot::new(&mut out);
            self.query_object(&I::IID, &mut slot).ok()?;
        }
        out.map(|ptr| unsafe { AutoPtr::take_over(ptr) })
    }

    pub fn num_strong_refs(&self) -> u32 {
        self.block().num_strong_refs()
    }

    pub fn num_weak_refs(&self) -> u32 {
        self.block().num_weak_refs()
    }

    pub fn state(&self) -> ObjectState {
        self.block().state()
    }

    pub fn is_alive(&self) -> bool {
        self.block().is_alive()
    }

    pub fn is_expired(&self) -> bool {
        self.block().is_expired()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const ControlBlock {
        self.block.as_ptr()
    }
}

impl Clone for WeakReference {
    fn clone(&self) -> Self {
        unsafe { Self::new(self.block) }
    }
}

impl Drop for WeakReference {
    fn drop(&mut self) {
        unsafe {
            ControlBlock::release_weak_ref(self.block);
        }
    }
}

impl PartialEq for WeakReference {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl Eq for WeakReference {}

impl fmt::Debug for WeakReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakReference").field(self.block()).finish()
    }
}
