//! Construction helper - allocate, construct, attach, or roll back
//!
//! Constructors receive an [`ObjectInit`] describing the storage being
//! filled and return the finished value. On `Err` nothing leaks: storage is
//! freed, the control block never becomes alive, and the constructor's error
//! is returned unchanged.

use super::base::{DelegatingBase, DestroyRecord, ObjectBase, RefCountedBase, RefCounter};
use super::control::{BlockLayout, ControlBlock, PackedBlock, TypeInfo, WeakReference};
use super::{tracker, IObject, ManagedObject};
use crate::allocator::{default_allocator, DebugInfo, MemoryAllocator};
use crate::config;
use crate::ptr::{AutoPtr, WeakPtr};
use crate::status::ObjectError;
use core::alloc::Layout;
use core::ops::Deref;
use core::ptr::{self, addr_of_mut, NonNull};
use std::fmt;
use tracing::{trace, warn};

/// Builds managed objects on an allocator
#[derive(Clone, Copy)]
pub struct Factory {
    allocator: &'static dyn MemoryAllocator,
    info: DebugInfo,
    packed: Option<bool>,
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").field("info", &self.info).field("packed", &self.packed).finish()
    }
}

impl Factory {
    /// Factory on the process-wide default allocator
    pub fn new() -> Self {
        Self::with_allocator(default_allocator())
    }

    pub fn with_allocator(allocator: &'static dyn MemoryAllocator) -> Self {
        Self { allocator, info: DebugInfo::UNAVAILABLE, packed: None }
    }

    /// Attach a description to allocations made by this factory
    pub fn describe(mut self, info: DebugInfo) -> Self {
        if config::current().objects.record_debug_info {
            self.info = info;
        }
        self
    }

    /// Override the configured control-block layout
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = Some(packed);
        self
    }

    fn layout(&self) -> BlockLayout {
        let packed = self.packed.unwrap_or_else(|| config::current().objects.pack_control_block);
        if packed {
            BlockLayout::Packed
        } else {
            BlockLayout::Separate
        }
    }

    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, ObjectError> {
        self.allocator
            .allocate_aligned(layout.size(), layout.align(), &self.info)
            .ok_or(ObjectError::OutOfMemory { size: layout.size(), align: layout.align() })
    }

    /// Create a weak-capable object
    ///
    /// The returned pointer adopts the object's initial strong reference.
    pub fn create<T, E, F>(&self, ctor: F) -> Result<AutoPtr<T>, E>
    where
        T: ManagedObject<Counter = RefCountedBase>,
        E: From<ObjectError>,
        F: FnOnce(ObjectInit<T>) -> Result<T, E>,
    {
        let layout = self.layout();
        let (block, storage) = match layout {
            BlockLayout::Packed => {
                let raw = self.allocate(Layout::new::<PackedBlock<T>>())?.cast::<PackedBlock<T>>();
                unsafe {
                    let block = addr_of_mut!((*raw.as_ptr()).block);
                    block.write(ControlBlock::new(self.allocator, layout, self.info));
                    let storage = addr_of_mut!((*raw.as_ptr()).object) as *mut T;
                    (NonNull::new_unchecked(block), NonNull::new_unchecked(storage))
                }
            }
            BlockLayout::Separate => {
                let block = self.allocate(Layout::new::<ControlBlock>())?.cast::<ControlBlock>();
                unsafe { block.as_ptr().write(ControlBlock::new(self.allocator, layout, self.info)) };
                let storage = match self.allocate(Layout::new::<T>()) {
                    Ok(storage) => storage.cast::<T>(),
                    Err(err) => {
                        unsafe { ControlBlock::abandon(block) };
                        return Err(err.into());
                    }
                };
                (block, storage)
            }
        };

        let init = ObjectInit { storage, origin: block };
        match ctor(init) {
            Ok(object) => unsafe {
                storage.as_ptr().write(object);
                block.as_ref().attach(storage);
                self.register(storage.cast());
                Ok(AutoPtr::take_over(storage))
            },
            Err(err) => {
                if layout == BlockLayout::Separate {
                    unsafe { self.allocator.free_aligned(storage.cast()) };
                }
                unsafe { ControlBlock::abandon(block) };
                self.rolled_back::<T>();
                Err(err)
            }
        }
    }

    /// Create a strong-only object; its counter lives inside the object
    pub fn create_strong<T, E, F>(&self, ctor: F) -> Result<AutoPtr<T>, E>
    where
        T: ManagedObject<Counter = ObjectBase>,
        E: From<ObjectError>,
        F: FnOnce(ObjectInit<T>) -> Result<T, E>,
    {
        let raw = self.allocate(Layout::new::<T>())?;
        let storage = raw.cast::<T>();
        let origin = DestroyRecord { storage: raw, info: TypeInfo::of::<T>(), allocator: self.allocator };

        match ctor(ObjectInit { storage, origin }) {
            Ok(object) => unsafe {
                storage.as_ptr().write(object);
                self.register(raw);
                Ok(AutoPtr::take_over(storage))
            },
            Err(err) => {
                unsafe { self.allocator.free_aligned(raw) };
                self.rolled_back::<T>();
                Err(err)
            }
        }
    }

    /// Create an object that forwards its triad to the object `owner` is
    /// constructing; the owner keeps it in a [`DelegatedBox`]
    pub fn create_delegating<T, O, E, F>(&self, owner: &ObjectInit<O>, ctor: F) -> Result<DelegatedBox<T>, E>
    where
        T: ManagedObject<Counter = DelegatingBase>,
        O: ManagedObject,
        E: From<ObjectError>,
        F: FnOnce(ObjectInit<T>) -> Result<T, E>,
    {
        let raw = self.allocate(Layout::new::<T>())?;
        let storage = raw.cast::<T>();

        match ctor(ObjectInit { storage, origin: owner.owner_ptr() }) {
            Ok(object) => unsafe {
                storage.as_ptr().write(object);
                self.register(raw);
                Ok(DelegatedBox { ptr: storage, allocator: self.allocator })
            },
            Err(err) => {
                unsafe { self.allocator.free_aligned(raw) };
                self.rolled_back::<T>();
                Err(err)
            }
        }
    }

    fn register(&self, object: NonNull<u8>) {
        tracker::add(object.as_ptr(), self.info);
        super::record_created();
        trace!(target: "object", ptr = ?object.as_ptr(), description = self.info.description, "object created");
    }

    fn rolled_back<T>(&self) {
        super::record_rollback();
        warn!(
            target: "object",
            ty = std::any::type_name::<T>(),
            description = self.info.description,
            "constructor failed, allocation rolled back"
        );
    }
}

/// Construction context handed to a constructor
pub struct ObjectInit<T: ManagedObject> {
    storage: NonNull<T>,
    origin: <T::Counter as RefCounter>::Origin,
}

impl<T: ManagedObject> ObjectInit<T> {
    /// The counter to embed in the new object
    pub fn into_base(self) -> T::Counter {
        unsafe { T::Counter::from_origin(self.origin) }
    }

    /// Counter for a part embedded in this object that shares its triad
    pub fn delegate(&self) -> DelegatingBase {
        unsafe { DelegatingBase::from_origin(self.owner_ptr()) }
    }

    /// Address the object will occupy; not initialized during construction
    pub fn object_ptr(&self) -> NonNull<T> {
        self.storage
    }

    fn owner_ptr(&self) -> NonNull<dyn IObject> {
        self.storage
    }
}

impl<T: ManagedObject<Counter = RefCountedBase>> ObjectInit<T> {
    /// Weak pointer to the object under construction
    ///
    /// It locks to null until construction succeeds, and stays null forever
    /// if the constructor fails.
    pub fn weak_self(&self) -> WeakPtr<T> {
        let weak = unsafe { WeakReference::new(self.origin) };
        WeakPtr::from_parts(weak, self.storage)
    }
}

/// Separately allocated object owned by the object it delegates to
pub struct DelegatedBox<T: ManagedObject<Counter = DelegatingBase>> {
    ptr: NonNull<T>,
    allocator: &'static dyn MemoryAllocator,
}

unsafe impl<T: ManagedObject<Counter = DelegatingBase>> Send for DelegatedBox<T> {}
unsafe impl<T: ManagedObject<Counter = DelegatingBase>> Sync for DelegatedBox<T> {}

impl<T: ManagedObject<Counter = DelegatingBase>> Deref for DelegatedBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ManagedObject<Counter = DelegatingBase>> Drop for DelegatedBox<T> {
    fn drop(&mut self) {
        let raw = self.ptr.cast::<u8>();
        tracker::remove(raw.as_ptr());
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            self.allocator.free_aligned(raw);
        }
        super::record_destroyed();
    }
}
