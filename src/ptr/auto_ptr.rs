//! Strong smart pointer

use super::{Related, WeakPtr};
use crate::object::{IObject, Interface, InterfaceSlot};
use crate::status::{ObjectError, Result};
use core::ptr::NonNull;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// Owns one strong reference to an object, or nothing
///
/// Every held reference is released exactly once: `reset` and `Drop` clear
/// the pointer before calling `release`.
pub struct AutoPtr<I: ?Sized + IObject> {
    ptr: Option<NonNull<I>>,
}

unsafe impl<I: ?Sized + IObject> Send for AutoPtr<I> {}
unsafe impl<I: ?Sized + IObject> Sync for AutoPtr<I> {}

impl<I: ?Sized + IObject> AutoPtr<I> {
    pub const fn null() -> Self {
        Self { ptr: None }
    }

    /// Take an additional strong reference to `object`
    pub fn from_ref(object: &I) -> Self {
        object.add_ref();
        Self { ptr: Some(NonNull::from(object)) }
    }

    /// Take an additional strong reference to the object at `ptr`
    ///
    /// # Safety
    /// `ptr` must point to a live object.
    pub unsafe fn from_raw(ptr: NonNull<I>) -> Self {
        ptr.as_ref().add_ref();
        Self { ptr: Some(ptr) }
    }

    /// Adopt a reference the caller already owns, without counting
    ///
    /// # Safety
    /// The caller transfers one strong reference on `ptr` to the result.
    #[inline]
    pub unsafe fn take_over(ptr: NonNull<I>) -> Self {
        Self { ptr: Some(ptr) }
    }

    #[inline]
    pub fn get(&self) -> Option<&I> {
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<I>> {
        self.ptr
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Move the reference out, leaving this pointer null
    #[inline]
    pub fn take(&mut self) -> Self {
        Self { ptr: self.ptr.take() }
    }

    /// Release the held reference
    ///
    /// Returns the count the release observed, or 0 for a null pointer.
    /// The value is advisory once other threads share the object.
    pub fn reset(&mut self) -> u32 {
        match self.ptr.take() {
            Some(ptr) => unsafe { ptr.as_ref().release() },
            None => 0,
        }
    }

    /// Give up ownership without releasing; the caller now owns the reference
    #[inline]
    pub fn detach(&mut self) -> Option<NonNull<I>> {
        self.ptr.take()
    }

    #[inline]
    pub fn into_raw(mut self) -> Option<NonNull<I>> {
        self.detach()
    }

    /// Release the current reference and adopt `ptr` without counting
    ///
    /// # Safety
    /// The caller transfers one strong reference on `ptr`. Attaching the
    /// pointer already held would release it first and adopt a dangling one.
    pub unsafe fn attach(&mut self, ptr: NonNull<I>) {
        debug_assert!(
            self.ptr.map_or(true, |held| held.cast::<u8>() != ptr.cast::<u8>()),
            "attaching the pointer already held"
        );
        self.reset();
        self.ptr = Some(ptr);
    }

    /// Convert to a pointer to another view of the same object
    ///
    /// ```ignore
    /// let blob: AutoPtr<dyn IDataBlob> = data_blob.upcast(|b| b as &dyn IDataBlob);
    /// ```
    pub fn upcast<U: ?Sized + IObject>(&self, view: impl FnOnce(&I) -> &U) -> AutoPtr<U> {
        match self.get() {
            Some(object) => AutoPtr::from_ref(view(object)),
            None => AutoPtr::null(),
        }
    }

    /// Query the object for capability `U`
    pub fn query<U: ?Sized + Interface + IObject>(&self) -> Result<AutoPtr<U>> {
        let object = self
            .get()
            .ok_or_else(|| ObjectError::InvalidArgs("query on a null pointer".to_string()))?;

        let mut out: Option<NonNull<U>> = None;
        {
            let mut slot = InterfaceSlot::new(&mut out);
            object.query_interface(&U::IID, &mut slot)?;
        }
        out.map(|ptr| unsafe { AutoPtr::take_over(ptr) })
            .ok_or(ObjectError::NoInterface(U::IID))
    }

    /// Weak pointer to the held object
    ///
    /// Fails with `NotImplemented` for objects without weak-reference support.
    pub fn as_weak(&self) -> Result<WeakPtr<I>> {
        let object = self
            .get()
            .ok_or_else(|| ObjectError::InvalidArgs("weak pointer from a null pointer".to_string()))?;
        let weak = object
            .weak_reference()
            .ok_or(ObjectError::NotImplemented("weak references"))?;
        Ok(WeakPtr::from_parts(weak, NonNull::from(object)))
    }

    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.ptr, &mut other.ptr)
    }

    #[inline]
    fn addr(&self) -> usize {
        self.ptr.map_or(0, |ptr| ptr.cast::<u8>().as_ptr() as usize)
    }
}

impl<I: ?Sized + IObject> Default for AutoPtr<I> {
    fn default() -> Self {
        Self::null()
    }
}

impl<I: ?Sized + IObject> Clone for AutoPtr<I> {
    fn clone(&self) -> Self {
        match self.get() {
            Some(object) => Self::from_ref(object),
            None => Self::null(),
        }
    }
}

impl<I: ?Sized + IObject> Drop for AutoPtr<I> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<I: ?Sized + IObject> Deref for AutoPtr<I> {
    type Target = I;

    /// # Panics
    /// Panics when the pointer is null.
    fn deref(&self) -> &I {
        match self.get() {
            Some(object) => object,
            None => panic!("dereferenced a null AutoPtr"),
        }
    }
}

// Identity comparison on the object address
impl<I, U> PartialEq<AutoPtr<U>> for AutoPtr<I>
where
    I: ?Sized + IObject + Related<U>,
    U: ?Sized + IObject,
{
    fn eq(&self, other: &AutoPtr<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<I: ?Sized + IObject> Eq for AutoPtr<I> {}

impl<I: ?Sized + IObject> PartialOrd for AutoPtr<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: ?Sized + IObject> Ord for AutoPtr<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<I: ?Sized + IObject> Hash for AutoPtr<I> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl<I: ?Sized + IObject> fmt::Debug for AutoPtr<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(ptr) => write!(f, "AutoPtr({:p})", ptr.cast::<u8>().as_ptr()),
            None => f.write_str("AutoPtr(null)"),
        }
    }
}

impl<I: ?Sized + IObject> From<&I> for AutoPtr<I> {
    fn from(object: &I) -> Self {
        Self::from_ref(object)
    }
}
