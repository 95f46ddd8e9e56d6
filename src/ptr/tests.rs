//! Smart pointer tests
//!
//! - AutoPtr: ownership transfer, counting, comparison, queries
//! - WeakPtr: locking, expiry, identity

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::guid::Guid;
    use crate::interface_entry;
    use crate::object::{
        Factory, IObject, Interface, InterfaceEntry, InterfaceTable, ManagedObject, ObjectBase,
        RefCountedBase,
    };
    use crate::status::ObjectError;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    trait ICounter: IObject {
        fn bump(&self) -> usize;
    }

    impl Interface for dyn ICounter {
        const IID: Guid = crate::guid!("3d6a0f12-8e4b-4c71-9a25-6b0e1d7f4c38");
    }

    trait IMissing: IObject {}

    impl Interface for dyn IMissing {
        const IID: Guid = crate::guid!("9e0c5b27-14af-4d3e-b862-5f17a0c93d4e");
    }

    struct Counter {
        base: RefCountedBase,
        hits: AtomicUsize,
        drops: Arc<AtomicUsize>,
    }

    impl InterfaceTable for Counter {
        const INTERFACES: &'static [InterfaceEntry<Self>] = &[
            interface_entry!(Counter => dyn IObject),
            interface_entry!(Counter => dyn ICounter),
            InterfaceEntry::END,
        ];
    }

    impl ManagedObject for Counter {
        type Counter = RefCountedBase;

        fn counter(&self) -> &RefCountedBase {
            &self.base
        }
    }

    impl ICounter for Counter {
        fn bump(&self) -> usize {
            self.hits.fetch_add(1, Ordering::Relaxed) + 1
        }
    }

    crate::related!(Counter => dyn ICounter);
    crate::related!(dyn ICounter => dyn IObject);

    impl Drop for Counter {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Plain {
        base: ObjectBase,
    }

    impl InterfaceTable for Plain {
        const INTERFACES: &'static [InterfaceEntry<Self>] = &[
            interface_entry!(Plain => dyn IObject),
            InterfaceEntry::END,
        ];
    }

    impl ManagedObject for Plain {
        type Counter = ObjectBase;

        fn counter(&self) -> &ObjectBase {
            &self.base
        }
    }

    fn make_counter(drops: &Arc<AtomicUsize>) -> AutoPtr<Counter> {
        Factory::new()
            .create(|init| {
                Ok::<_, ObjectError>(Counter {
                    base: init.into_base(),
                    hits: AtomicUsize::new(0),
                    drops: drops.clone(),
                })
            })
            .expect("counter constructs")
    }

    fn count(object: &AutoPtr<Counter>) -> u32 {
        object.counter().strong_count()
    }

    // ===== AutoPtr Tests =====

    #[test]
    fn null_pointer_defaults() {
        let mut ptr: AutoPtr<dyn IObject> = AutoPtr::default();
        assert!(ptr.is_null());
        assert!(ptr.get().is_none());
        assert_eq!(ptr.reset(), 0);
        assert_eq!(ptr, AutoPtr::<dyn ICounter>::null());
        assert_eq!(format!("{:?}", ptr), "AutoPtr(null)");
    }

    #[test]
    fn clone_and_reset_move_the_count() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = make_counter(&drops);
        assert_eq!(count(&first), 1, "creator adopts the initial reference");

        let mut second = first.clone();
        assert_eq!(count(&first), 2);
        assert_eq!(second, first);

        assert_eq!(second.reset(), 1);
        assert!(second.is_null());
        assert_eq!(count(&first), 1);

        drop(first);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_and_attach_transfer_without_counting() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut owner = make_counter(&drops);
        let raw = owner.detach().expect("non-null");
        assert!(owner.is_null());

        let mut adopted: AutoPtr<Counter> = AutoPtr::null();
        unsafe { adopted.attach(raw) };
        assert_eq!(count(&adopted), 1);

        let other = make_counter(&drops);
        let raw_other = other.into_raw().expect("non-null");
        unsafe { adopted.attach(raw_other) };
        assert_eq!(drops.load(Ordering::SeqCst), 1, "attach released the previous object");
        assert_eq!(count(&adopted), 1);
    }

    #[test]
    fn from_ref_adds_a_reference() {
        let drops = Arc::new(AtomicUsize::new(0));
        let owner = make_counter(&drops);
        let borrowed: &Counter = &owner;

        let extra = AutoPtr::from(borrowed);
        assert_eq!(count(&owner), 2);
        drop(extra);

        let raw = owner.as_ptr().expect("non-null");
        let again = unsafe { AutoPtr::from_raw(raw) };
        assert_eq!(count(&owner), 2);
        drop(again);
        assert_eq!(count(&owner), 1);
    }

    #[test]
    fn take_leaves_source_null() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut source = make_counter(&drops);
        let moved = source.take();

        assert!(source.is_null());
        assert_eq!(count(&moved), 1);
    }

    #[test]
    fn swap_exchanges_targets() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = make_counter(&drops);
        let mut b = AutoPtr::null();
        let address = a.as_ptr();

        a.swap(&mut b);
        assert!(a.is_null());
        assert_eq!(b.as_ptr(), address);
    }

    #[test]
    fn query_returns_counted_interface() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = make_counter(&drops);

        let counter = object.query::<dyn ICounter>().expect("declared interface");
        assert_eq!(counter.bump(), 1);
        assert_eq!(count(&object), 2);

        let missing = object.query::<dyn IMissing>();
        assert_eq!(missing.err(), Some(ObjectError::NoInterface(<dyn IMissing as Interface>::IID)));
        assert_eq!(count(&object), 2);
    }

    #[test]
    fn query_on_null_is_invalid() {
        let null: AutoPtr<dyn IObject> = AutoPtr::null();
        assert!(matches!(null.query::<dyn ICounter>(), Err(ObjectError::InvalidArgs(_))));
        assert!(matches!(null.as_weak(), Err(ObjectError::InvalidArgs(_))));
    }

    #[test]
    fn upcast_shares_the_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = make_counter(&drops);

        let view: AutoPtr<dyn ICounter> = object.upcast(|c| c as &dyn ICounter);
        assert_eq!(view, object);
        assert_eq!(count(&object), 2);
    }

    #[test]
    fn comparison_through_base_capability() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = make_counter(&drops);
        let other = make_counter(&drops);

        let base: AutoPtr<dyn IObject> = object.query().expect("base capability");
        assert_eq!(object, base);
        assert_eq!(base, object);
        assert_ne!(base, other);

        let weak_base: WeakPtr<dyn IObject> = base.as_weak().expect("weak-capable");
        assert_eq!(WeakPtr::from(&object), weak_base);
    }

    #[test]
    fn pointers_order_and_hash_by_address() {
        let drops = Arc::new(AtomicUsize::new(0));
        let a = make_counter(&drops);
        let b = make_counter(&drops);

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b.clone());
        assert_eq!(set.len(), 2);

        let (low, high) = if a < b { (&a, &b) } else { (&b, &a) };
        assert!(low.as_ptr().map(|p| p.as_ptr() as usize) < high.as_ptr().map(|p| p.as_ptr() as usize));
    }

    #[test]
    #[should_panic(expected = "null AutoPtr")]
    fn deref_of_null_panics() {
        let null: AutoPtr<dyn ICounter> = AutoPtr::null();
        null.bump();
    }

    #[test]
    fn strong_only_object_has_no_weak_pointer() {
        let plain = Factory::new()
            .create_strong(|init| Ok::<_, ObjectError>(Plain { base: init.into_base() }))
            .expect("plain constructs");

        assert_eq!(plain.as_weak().err(), Some(ObjectError::NotImplemented("weak references")));
        assert!(WeakPtr::new(&*plain).is_null());
    }

    // ===== WeakPtr Tests =====

    #[test]
    fn null_weak_pointer() {
        let mut weak: WeakPtr<dyn IObject> = WeakPtr::default();
        assert!(weak.is_null());
        assert!(!weak.is_valid());
        assert!(weak.lock().is_null());
        assert!(weak.control_block().is_none());
        assert_eq!(format!("{:?}", weak), "WeakPtr(null)");
    }

    #[test]
    fn lock_while_alive_adds_a_reference() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = make_counter(&drops);
        let mut weak = object.as_weak().expect("weak-capable");

        assert!(weak.is_valid());
        let locked = weak.lock();
        assert_eq!(locked, object);
        assert_eq!(count(&object), 2);
        assert_eq!(weak.weak_reference().map(|w| w.num_weak_refs()), Some(1));
    }

    #[test]
    fn lock_after_destruction_resets() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = make_counter(&drops);
        let mut weak = WeakPtr::from(&object);

        drop(object);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!weak.is_valid());
        assert!(!weak.is_null(), "expiry alone does not reset");

        assert!(weak.lock().is_null());
        assert!(weak.is_null());
        assert!(weak.lock().is_null());
    }

    #[test]
    fn weak_pointers_compare_by_control_block() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = make_counter(&drops);
        let other = make_counter(&drops);

        let weak = WeakPtr::from(&object);
        let copy = weak.clone();
        let view: WeakPtr<dyn ICounter> = WeakPtr::new(&*object.upcast(|c| c as &dyn ICounter));

        assert_eq!(weak, copy);
        assert_eq!(weak, view);
        assert_ne!(weak, WeakPtr::from(&other));
        assert_eq!(weak.weak_reference().map(|w| w.num_weak_refs()), Some(3));
    }

    #[test]
    fn reset_releases_the_weak_unit() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = make_counter(&drops);
        let mut weak = WeakPtr::from(&object);
        let probe = object.as_weak().expect("weak-capable");

        weak.reset();
        assert!(weak.is_null());
        assert_eq!(probe.weak_reference().map(|w| w.num_weak_refs()), Some(1));
        assert_eq!(probe.unsafe_raw_ptr(), object.as_ptr());
    }
}
