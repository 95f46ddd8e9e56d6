mod common;

use common::{counted_node, make_node, INode, Node, Probe};
use donut_object::allocator::CountingAllocator;
use donut_object::object::{ObjectInit, ObjectState};
use donut_object::{AutoPtr, Factory, ObjectError, WeakPtr};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
fn test_creator_adopts_initial_reference() {
    let probe = Probe::new();
    let node = make_node(1, &probe);
    assert_eq!(node.strong_count(), 1);

    let a = node.clone();
    let b = a.clone();
    assert_eq!(node.strong_count(), 3);

    drop(node);
    assert_eq!(a.strong_count(), 2);
    drop(b);
    assert_eq!(a.strong_count(), 1);
    assert_eq!(probe.drops(), 0);

    drop(a);
    assert_eq!(probe.drops(), 1);
    assert_eq!(probe.pre_destroys.load(Ordering::SeqCst), 1);
}

#[test]
fn test_weak_pointer_outlives_strong() {
    let probe = Probe::new();
    let strong = make_node(2, &probe);
    let mut weak = WeakPtr::from(&strong);

    assert_eq!(weak.lock().id(), 2);
    drop(strong);

    for _ in 0..3 {
        assert!(weak.lock().is_null());
    }
    assert!(!weak.is_valid());
    assert_eq!(probe.drops(), 1);
}

#[test]
fn test_control_block_freed_with_last_weak_reference() {
    let probe = Probe::new();
    let (strong, counting) = counted_node(3, &probe);
    let weak = WeakPtr::from(&strong);
    let block = weak.weak_reference().cloned().expect("weak-capable");

    drop(strong);
    assert_eq!(probe.drops(), 1);
    assert_eq!(block.state(), ObjectState::Destroyed);
    assert_eq!(counting.outstanding(), 1, "block kept for weak references");

    drop(weak);
    assert_eq!(counting.outstanding(), 1);
    drop(block);
    assert_eq!(counting.outstanding(), 0);
    assert_eq!(counting.allocations(), counting.frees());
}

#[test]
fn test_control_block_freed_immediately_without_weak_references() {
    let probe = Probe::new();
    let (strong, counting) = counted_node(4, &probe);

    drop(strong);
    assert_eq!(probe.drops(), 1);
    assert_eq!(counting.outstanding(), 0);
}

#[test]
fn test_failed_lock_resets_and_stays_cheap() {
    let probe = Probe::new();
    let (strong, counting) = counted_node(5, &probe);
    let mut weak = WeakPtr::from(&strong);
    drop(strong);
    assert_eq!(counting.outstanding(), 1);

    // The first lock gives up the weak unit, freeing the block
    assert!(weak.lock().is_null());
    assert!(weak.is_null());
    assert!(weak.control_block().is_none());
    assert_eq!(counting.outstanding(), 0);
    let frees = counting.frees();

    // The second one never reaches a control block
    assert!(weak.lock().is_null());
    assert_eq!(counting.frees(), frees);
}

#[test]
fn test_pre_destroy_clears_external_observer() {
    let probe = Probe::new();
    let (strong, counting) = counted_node(6, &probe);
    *probe.observer.lock() = Some(WeakPtr::from(&strong));
    assert_eq!(strong.weak_count(), 1);

    drop(strong);
    assert!(probe.observer.lock().is_none());
    assert_eq!(probe.drops(), 1);
    assert_eq!(counting.outstanding(), 0, "observer's weak unit was the last one");
}

#[test]
fn test_query_through_interface_pointer() {
    let probe = Probe::new();
    let node = make_node(7, &probe);

    let itf: AutoPtr<dyn INode> = node.query::<dyn INode>().expect("declared capability");
    assert_eq!(itf.id(), 7);
    assert_eq!(node.strong_count(), 2);

    let absent = itf.query::<dyn common::IAbsent>();
    assert!(matches!(absent, Err(ObjectError::NoInterface(_))));
    assert_eq!(node.strong_count(), 2);
}

/// Error type of a constructor that is not an `ObjectError`
#[derive(Debug, PartialEq)]
enum BuildError {
    Refused(&'static str),
    Object(ObjectError),
}

impl From<ObjectError> for BuildError {
    fn from(err: ObjectError) -> Self {
        BuildError::Object(err)
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Refused(reason) => write!(f, "refused: {}", reason),
            BuildError::Object(err) => write!(f, "{}", err),
        }
    }
}

#[test]
fn test_failed_constructor_leaks_nothing() {
    for packed in [true, false] {
        let counting = CountingAllocator::leaked();
        let weak_was_null = AtomicBool::new(false);

        let result = Factory::with_allocator(counting).packed(packed).create(
            |init: ObjectInit<Node>| -> Result<Node, BuildError> {
                let mut me = init.weak_self();
                weak_was_null.store(me.lock().is_null(), Ordering::SeqCst);
                Err(BuildError::Refused("self-referencing constructor"))
            },
        );

        let err = result.err().expect("constructor error propagates");
        assert_eq!(err, BuildError::Refused("self-referencing constructor"));
        assert_eq!(err.to_string(), "refused: self-referencing constructor");
        assert!(weak_was_null.load(Ordering::SeqCst));
        assert_eq!(counting.allocations(), counting.frees(), "packed = {}", packed);
    }
}

#[test]
fn test_escaped_self_weak_pointer_never_locks() {
    let counting = CountingAllocator::leaked();
    let mut escaped = None;

    let result = Factory::with_allocator(counting).create(|init: ObjectInit<Node>| {
        escaped = Some(init.weak_self());
        Err::<Node, _>(ObjectError::Generic("late failure".to_string()))
    });
    assert_eq!(result.err(), Some(ObjectError::Generic("late failure".to_string())));

    let mut escaped = escaped.expect("weak pointer escaped");
    let copy = escaped.clone();
    assert!(!escaped.is_valid());
    assert!(escaped.lock().is_null());
    assert_eq!(counting.outstanding(), 1, "copy still holds the block");

    drop(copy);
    assert_eq!(counting.outstanding(), 0);
}

#[test]
fn test_weak_lock_keeps_object_alive() {
    let probe = Probe::new();
    let strong = make_node(8, &probe);
    let mut weak = WeakPtr::from(&strong);

    let locked = weak.lock();
    drop(strong);
    assert_eq!(probe.drops(), 0);
    assert!(!locked.is_destroying());
    assert_eq!(locked.strong_count(), 1);

    drop(locked);
    assert_eq!(probe.drops(), 1);
}

#[test]
fn test_typed_weak_pointer_from_interface() {
    let probe = Probe::new();
    let node = make_node(9, &probe);
    let itf = node.query::<dyn INode>().expect("declared capability");

    let mut weak: WeakPtr<dyn INode> = itf.as_weak().expect("weak-capable");
    drop(itf);
    assert_eq!(weak.lock().id(), 9);

    drop(node);
    assert!(weak.lock().is_null());
}

#[test]
fn test_node_identity_survives_queries() {
    let probe = Probe::new();
    let node: AutoPtr<Node> = make_node(10, &probe);
    let object = node.query::<dyn donut_object::IObject>().expect("base capability");
    let itf = object.query::<dyn INode>().expect("declared capability");

    assert_eq!(node, object);
    assert_eq!(object, itf);
}
