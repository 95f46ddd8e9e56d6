//! Object model - intrusive strong/weak reference counting with capability queries
//!
//! Design: every managed object exposes the same triad through [`IObject`]:
//! 1. `query_interface` resolves a capability ID through a static dispatch table
//! 2. `add_ref` / `release` move the strong count
//! 3. Objects that opt into weak references hand out their control block
//!
//! Concrete types never implement [`IObject`] by hand. They declare their
//! table ([`InterfaceTable`]) and which counter they embed ([`ManagedObject`]);
//! the blanket implementation below wires the triad to that counter.

mod dispatch;
mod base;
mod control;
mod factory;
pub mod tracker;


pub use dispatch::{query_table, InterfaceEntry, InterfaceSlot, Resolver};
pub use base::{DelegatingBase, DestroyRecord, ObjectBase, RefCountedBase, RefCounter};
pub use control::{BlockLayout, ControlBlock, ObjectState, TypeInfo, WeakReference};
pub use factory::{DelegatedBox, Factory, ObjectInit};

use crate::guid::Guid;
use crate::status::Result;
use crossbeam::utils::CachePadded;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Capability shared by every object
pub const IID_OBJECT: Guid = Guid::NULL;

/// Capability ID carried by an interface type (`dyn Trait`) or a concrete class
pub trait Interface {
    const IID: Guid;
}

/// Base capability of every managed object
pub trait IObject: Send + Sync + 'static {
    /// Resolve `iid` into `slot`, adding one strong reference on success.
    ///
    /// On failure the slot is left empty and `Err(NoInterface)` is returned.
    fn query_interface(&self, iid: &Guid, slot: &mut InterfaceSlot<'_>) -> Result<()>;

    /// Add a strong reference and return the new count
    fn add_ref(&self) -> u32;

    /// Drop a strong reference and return the remaining count.
    ///
    /// # Safety
    /// The caller must own the reference being released. When the count
    /// reaches zero the object is destroyed and `self` dangles.
    unsafe fn release(&self) -> u32;

    /// Control block handle for objects that support weak references
    fn weak_reference(&self) -> Option<WeakReference> {
        None
    }

    fn as_object(&self) -> &dyn IObject;
}

impl Interface for dyn IObject {
    const IID: Guid = IID_OBJECT;
}

/// Static, per-type dispatch table
pub trait InterfaceTable: Sized + 'static {
    const INTERFACES: &'static [InterfaceEntry<Self>];
}

/// A type whose triad is driven by an embedded counter
pub trait ManagedObject: InterfaceTable + Send + Sync {
    type Counter: RefCounter;

    fn counter(&self) -> &Self::Counter;

    /// Runs after the strong count reached zero and before the destructor.
    ///
    /// Used to clear external observers of this object.
    fn pre_destroy(&self) {}
}

impl<T: ManagedObject> IObject for T {
    fn query_interface(&self, iid: &Guid, slot: &mut InterfaceSlot<'_>) -> Result<()> {
        match self.counter().owner() {
            Some(owner) => owner.query_interface(iid, slot),
            None => query_table(self, self, iid, slot),
        }
    }

    #[inline]
    fn add_ref(&self) -> u32 {
        self.counter().add_ref()
    }

    #[inline]
    unsafe fn release(&self) -> u32 {
        self.counter().release(&|| self.pre_destroy())
    }

    fn weak_reference(&self) -> Option<WeakReference> {
        self.counter().weak_reference()
    }

    fn as_object(&self) -> &dyn IObject {
        self
    }
}

/// Query `object`'s own table, bypassing any owner it delegates to
pub fn non_delegating_query<T: ManagedObject>(
    object: &T,
    iid: &Guid,
    slot: &mut InterfaceSlot<'_>,
) -> Result<()> {
    query_table(object, object, iid, slot)
}

struct ObjectCounters {
    created: CachePadded<AtomicUsize>,
    destroyed: CachePadded<AtomicUsize>,
    blocks_freed: CachePadded<AtomicUsize>,
    rollbacks: CachePadded<AtomicUsize>,
    failed_queries: CachePadded<AtomicUsize>,
}

static COUNTERS: Lazy<ObjectCounters> = Lazy::new(|| ObjectCounters {
    created: CachePadded::new(AtomicUsize::new(0)),
    destroyed: CachePadded::new(AtomicUsize::new(0)),
    blocks_freed: CachePadded::new(AtomicUsize::new(0)),
    rollbacks: CachePadded::new(AtomicUsize::new(0)),
    failed_queries: CachePadded::new(AtomicUsize::new(0)),
});

#[inline]
pub(crate) fn record_created() {
    COUNTERS.created.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_destroyed() {
    COUNTERS.destroyed.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_block_freed() {
    COUNTERS.blocks_freed.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_rollback() {
    COUNTERS.rollbacks.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_failed_query() {
    COUNTERS.failed_queries.fetch_add(1, Ordering::Relaxed);
}

/// Process-wide object lifecycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectStats {
    pub created: usize,
    pub destroyed: usize,
    pub blocks_freed: usize,
    pub rollbacks: usize,
    pub failed_queries: usize,
}

impl ObjectStats {
    /// Objects constructed and not yet destroyed
    pub fn alive(&self) -> usize {
        self.created.saturating_sub(self.destroyed)
    }
}

pub fn stats() -> ObjectStats {
    ObjectStats {
        created: COUNTERS.created.load(Ordering::Relaxed),
        destroyed: COUNTERS.destroyed.load(Ordering::Relaxed),
        blocks_freed: COUNTERS.blocks_freed.load(Ordering::Relaxed),
        rollbacks: COUNTERS.rollbacks.load(Ordering::Relaxed),
        failed_queries: COUNTERS.failed_queries.load(Ordering::Relaxed),
    }
}
