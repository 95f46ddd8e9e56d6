//! Dispatch table - static capability lookup
//!
//! Each managed type lists `(capability ID, resolver)` entries. Lookup scans
//! them in order and stops at the first entry that both matches the
//! requested ID and resolves; a failing match does not end the scan.
//!
//! Resolvers:
//! - `Cast`: hand out the object itself as one of its interface types
//! - `Parent`: scan an embedded part's table on behalf of the same holder
//! - `Member`: run a contained object's non-delegating query
//! - `End`: terminator

use super::{IObject, InterfaceTable, IID_OBJECT};
use crate::guid::Guid;
use crate::status::{ObjectError, Result};
use core::ptr::NonNull;
use std::any::Any;

/// Typed output parameter of a capability query
///
/// Wraps a caller-owned `Option<NonNull<I>>`. A resolver can only fill the
/// slot with a pointer of exactly the interface type the caller asked for.
pub struct InterfaceSlot<'a> {
    out: &'a mut (dyn Any + 'static),
    clear: fn(&mut (dyn Any + 'static)),
}

fn clear_slot<I: ?Sized + 'static>(out: &mut (dyn Any + 'static)) {
    if let Some(out) = out.downcast_mut::<Option<NonNull<I>>>() {
        *out = None;
    }
}

impl<'a> InterfaceSlot<'a> {
    /// Wrap `out`, resetting it to `None`
    pub fn new<I: ?Sized + 'static>(out: &'a mut Option<NonNull<I>>) -> Self {
        *out = None;
        Self { out, clear: clear_slot::<I> }
    }

    /// Store `ptr` if the slot expects `I`; returns whether it was stored
    #[inline]
    pub fn fill<I: ?Sized + 'static>(&mut self, ptr: NonNull<I>) -> bool {
        match self.out.downcast_mut::<Option<NonNull<I>>>() {
            Some(out) => {
                *out = Some(ptr);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn accepts<I: ?Sized + 'static>(&self) -> bool {
        self.out.is::<Option<NonNull<I>>>()
    }

    #[inline]
    pub fn clear(&mut self) {
        (self.clear)(&mut *self.out)
    }
}

pub type CastFn<T> = for<'a, 'b> fn(&'a T, &mut InterfaceSlot<'b>) -> bool;

pub type RouteFn<T> =
    for<'a, 'b, 'c> fn(&'a T, &'b dyn IObject, &Guid, &mut InterfaceSlot<'c>) -> Result<()>;

/// How a matching entry produces its pointer
pub enum Resolver<T> {
    Cast(CastFn<T>),
    Parent(RouteFn<T>),
    Member(RouteFn<T>),
    End,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Resolver<T> {}

/// One row of a dispatch table; `iid == None` matches every request
pub struct InterfaceEntry<T> {
    pub iid: Option<Guid>,
    pub resolver: Resolver<T>,
}

impl<T> InterfaceEntry<T> {
    pub const END: InterfaceEntry<T> = InterfaceEntry { iid: None, resolver: Resolver::End };

    pub const fn cast(iid: Guid, cast: CastFn<T>) -> Self {
        Self { iid: Some(iid), resolver: Resolver::Cast(cast) }
    }

    pub const fn parent(iid: Option<Guid>, route: RouteFn<T>) -> Self {
        Self { iid, resolver: Resolver::Parent(route) }
    }

    pub const fn member(iid: Option<Guid>, route: RouteFn<T>) -> Self {
        Self { iid, resolver: Resolver::Member(route) }
    }

    #[inline]
    fn matches(&self, iid: &Guid) -> bool {
        self.iid.map_or(true, |id| id == *iid)
    }

    fn resolve(
        &self,
        part: &T,
        holder: &dyn IObject,
        iid: &Guid,
        slot: &mut InterfaceSlot<'_>,
    ) -> bool {
        match self.resolver {
            Resolver::Cast(cast) => {
                if cast(part, slot) {
                    holder.add_ref();
                    true
                } else {
                    false
                }
            }
            Resolver::Parent(route) | Resolver::Member(route) => {
                route(part, holder, iid, slot).is_ok()
            }
            Resolver::End => false,
        }
    }
}

impl<T> std::fmt::Debug for InterfaceEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.resolver {
            Resolver::Cast(_) => "cast",
            Resolver::Parent(_) => "parent",
            Resolver::Member(_) => "member",
            Resolver::End => "end",
        };
        f.debug_struct("InterfaceEntry").field("iid", &self.iid).field("resolver", &kind).finish()
    }
}

/// Resolve `iid` against `T`'s table
///
/// `part` is the value whose table is scanned and `holder` the object whose
/// strong count a successful cast increments. They are the same object except
/// when a parent route scans an embedded part.
pub fn query_table<T: InterfaceTable>(
    part: &T,
    holder: &dyn IObject,
    iid: &Guid,
    slot: &mut InterfaceSlot<'_>,
) -> Result<()> {
    // Every object supports the base capability, wherever its table lists it
    if *iid == IID_OBJECT && slot.fill::<dyn IObject>(NonNull::from(holder.as_object())) {
        holder.add_ref();
        return Ok(());
    }

    for entry in T::INTERFACES {
        if matches!(entry.resolver, Resolver::End) {
            break;
        }
        if entry.matches(iid) && entry.resolve(part, holder, iid, slot) {
            return Ok(());
        }
    }

    slot.clear();
    Err(ObjectError::NoInterface(*iid))
}

/// Dispatch-table entry exposing `$ty` as the interface type `$itf`
///
/// ```ignore
/// impl InterfaceTable for DataBlob {
///     const INTERFACES: &'static [InterfaceEntry<Self>] = &[
///         interface_entry!(DataBlob => dyn IObject),
///         interface_entry!(DataBlob => dyn IDataBlob),
///         InterfaceEntry::END,
///     ];
/// }
/// ```
#[macro_export]
macro_rules! interface_entry {
    ($ty:ty => $itf:ty) => {
        $crate::object::InterfaceEntry::<$ty>::cast(
            <$itf as $crate::object::Interface>::IID,
            |object: &$ty, slot: &mut $crate::object::InterfaceSlot<'_>| {
                slot.fill::<$itf>(::core::ptr::NonNull::from(object as &$itf))
            },
        )
    };
}
