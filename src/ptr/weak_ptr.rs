//! Weak smart pointer

use super::{AutoPtr, Related};
use crate::object::{ControlBlock, IObject, InterfaceSlot, WeakReference, IID_OBJECT};
use core::ptr::NonNull;
use std::fmt;

/// Observes an object without keeping it alive
///
/// Holds one weak unit on the object's control block plus the object address,
/// which is only dereferenced after [`WeakPtr::lock`] proved the object alive.
pub struct WeakPtr<I: ?Sized + IObject> {
    inner: Option<(WeakReference, NonNull<I>)>,
}

unsafe impl<I: ?Sized + IObject> Send for WeakPtr<I> {}
unsafe impl<I: ?Sized + IObject> Sync for WeakPtr<I> {}

impl<I: ?Sized + IObject> WeakPtr<I> {
    pub const fn null() -> Self {
        Self { inner: None }
    }

    /// Weak pointer to `object`; null when the object has no weak support
    pub fn new(object: &I) -> Self {
        match object.weak_reference() {
            Some(weak) => Self::from_parts(weak, NonNull::from(object)),
            None => Self::null(),
        }
    }

    pub(crate) fn from_parts(weak: WeakReference, object: NonNull<I>) -> Self {
        Self { inner: Some((weak, object)) }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the object currently has strong owners
    ///
    /// Racy by nature: a `true` result does not make a later `lock` succeed.
    pub fn is_valid(&self) -> bool {
        self.inner.as_ref().map_or(false, |(weak, _)| weak.num_strong_refs() > 0)
    }

    /// Give up the weak unit
    pub fn reset(&mut self) {
        self.inner = None;
    }

    /// Strong pointer to the object, or null if it is gone
    ///
    /// A failed lock resets this pointer, so later calls return null without
    /// touching the control block.
    pub fn lock(&mut self) -> AutoPtr<I> {
        let (weak, object) = match &self.inner {
            Some((weak, object)) => (weak, *object),
            None => return AutoPtr::null(),
        };

        let mut probe: Option<NonNull<dyn IObject>> = None;
        let alive = {
            let mut slot = InterfaceSlot::new(&mut probe);
            weak.query_object(&IID_OBJECT, &mut slot).is_ok()
        };

        match probe {
            Some(probe) if alive => unsafe {
                let strong = AutoPtr::from_raw(object);
                probe.as_ref().release();
                strong
            },
            _ => {
                self.reset();
                AutoPtr::null()
            }
        }
    }

    /// The object address without any liveness guarantee
    #[inline]
    pub fn unsafe_raw_ptr(&self) -> Option<NonNull<I>> {
        self.inner.as_ref().map(|(_, object)| *object)
    }

    /// Control block this pointer observes
    #[inline]
    pub fn control_block(&self) -> Option<*const ControlBlock> {
        self.inner.as_ref().map(|(weak, _)| weak.as_ptr())
    }

    pub fn weak_reference(&self) -> Option<&WeakReference> {
        self.inner.as_ref().map(|(weak, _)| weak)
    }
}

impl<I: ?Sized + IObject> Default for WeakPtr<I> {
    fn default() -> Self {
        Self::null()
    }
}

impl<I: ?Sized + IObject> Clone for WeakPtr<I> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<I: ?Sized + IObject> From<&AutoPtr<I>> for WeakPtr<I> {
    fn from(strong: &AutoPtr<I>) -> Self {
        strong.get().map_or_else(Self::null, Self::new)
    }
}

// Two weak pointers are equal when they observe the same control block
impl<I, U> PartialEq<WeakPtr<U>> for WeakPtr<I>
where
    I: ?Sized + IObject + Related<U>,
    U: ?Sized + IObject,
{
    fn eq(&self, other: &WeakPtr<U>) -> bool {
        self.control_block() == other.control_block()
    }
}

impl<I: ?Sized + IObject> Eq for WeakPtr<I> {}

impl<I: ?Sized + IObject> fmt::Debug for WeakPtr<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some((weak, _)) => f.debug_tuple("WeakPtr").field(weak).finish(),
            None => f.write_str("WeakPtr(null)"),
        }
    }
}
