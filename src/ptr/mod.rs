//! Smart pointers - RAII strong ownership and weak observation
//!
//! - [`AutoPtr`]: owns one strong reference, released on drop
//! - [`WeakPtr`]: owns one weak unit; `lock` promotes it to an [`AutoPtr`]
//!   only while the object is alive

mod auto_ptr;
mod weak_ptr;

#[cfg(test)]
mod tests;

pub use auto_ptr::AutoPtr;
pub use weak_ptr::WeakPtr;

use crate::object::{IObject, ManagedObject};

/// Pointer types that may view the same object
///
/// `AutoPtr<I> == AutoPtr<U>` (and the `WeakPtr` equivalent) compiles only
/// when `I: Related<U>`. Every type is related to itself and every concrete
/// class to the base capability. Interface views declare theirs with
/// [`related!`](crate::related).
///
/// ```compile_fail
/// use donut_object::blob::{DataBlob, StringBlob};
/// use donut_object::AutoPtr;
///
/// fn same(a: &AutoPtr<DataBlob>, b: &AutoPtr<StringBlob>) -> bool {
///     a == b
/// }
/// ```
pub trait Related<U: ?Sized> {}

impl<I: ?Sized + IObject> Related<I> for I {}

impl<T: ManagedObject> Related<dyn IObject> for T {}

impl<T: ManagedObject> Related<T> for dyn IObject {}

/// Declare two pointer targets related in both directions
///
/// ```ignore
/// related!(DataBlob => dyn IDataBlob);
/// related!(dyn IDataBlob => dyn IObject);
/// ```
#[macro_export]
macro_rules! related {
    ($a:ty => $b:ty) => {
        impl $crate::ptr::Related<$b> for $a {}
        impl $crate::ptr::Related<$a> for $b {}
    };
}
