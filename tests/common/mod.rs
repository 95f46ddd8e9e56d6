//! Shared fixtures for integration tests

#![allow(dead_code)]

use donut_object::allocator::CountingAllocator;
use donut_object::object::{InterfaceEntry, InterfaceTable, ManagedObject, RefCountedBase};
use donut_object::{interface_entry, AutoPtr, Factory, Guid, IObject, Interface, ObjectError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Capability of [`Node`]
pub trait INode: IObject {
    fn id(&self) -> u32;

    /// Set once teardown has started
    fn is_destroying(&self) -> bool;
}

impl Interface for dyn INode {
    const IID: Guid = donut_object::guid!("c4a1e7d2-5b38-4f06-9e1d-7a2c8b3f6e51");
}

donut_object::related!(dyn INode => dyn IObject);
donut_object::related!(Node => dyn INode);

/// Never implemented by anything
pub trait IAbsent: IObject {}

impl Interface for dyn IAbsent {
    const IID: Guid = donut_object::guid!("e2b9d4c6-0a7f-4e13-8c5b-3d1f9a6e2c70");
}

/// Teardown observations shared between a node and the test
#[derive(Default)]
pub struct Probe {
    pub drops: AtomicUsize,
    pub pre_destroys: AtomicUsize,
    /// Adjusted by tests in lockstep with manual add_ref / release
    pub tally: AtomicI64,
    /// Observer slot cleared by the pre-destroy hook
    pub observer: Mutex<Option<donut_object::WeakPtr<Node>>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

pub struct Node {
    base: RefCountedBase,
    id: u32,
    destroying: AtomicBool,
    probe: Arc<Probe>,
}

impl Node {
    pub fn strong_count(&self) -> u32 {
        self.base.strong_count()
    }

    pub fn weak_count(&self) -> u32 {
        self.base.weak_count()
    }
}

impl InterfaceTable for Node {
    const INTERFACES: &'static [InterfaceEntry<Self>] = &[
        interface_entry!(Node => dyn IObject),
        interface_entry!(Node => dyn INode),
        InterfaceEntry::END,
    ];
}

impl ManagedObject for Node {
    type Counter = RefCountedBase;

    fn counter(&self) -> &RefCountedBase {
        &self.base
    }

    fn pre_destroy(&self) {
        self.destroying.store(true, Ordering::SeqCst);
        self.probe.pre_destroys.fetch_add(1, Ordering::SeqCst);
        self.probe.observer.lock().take();
    }
}

impl INode for Node {
    fn id(&self) -> u32 {
        self.id
    }

    fn is_destroying(&self) -> bool {
        self.destroying.load(Ordering::SeqCst)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.destroying.store(true, Ordering::SeqCst);
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn make_node_with(factory: Factory, id: u32, probe: &Arc<Probe>) -> AutoPtr<Node> {
    factory
        .create(|init| {
            Ok::<_, ObjectError>(Node {
                base: init.into_base(),
                id,
                destroying: AtomicBool::new(false),
                probe: probe.clone(),
            })
        })
        .expect("node constructs")
}

pub fn make_node(id: u32, probe: &Arc<Probe>) -> AutoPtr<Node> {
    make_node_with(Factory::new(), id, probe)
}

/// Node on a fresh counting allocator
pub fn counted_node(id: u32, probe: &Arc<Probe>) -> (AutoPtr<Node>, &'static CountingAllocator) {
    let counting = CountingAllocator::leaked();
    (make_node_with(Factory::with_allocator(counting), id, probe), counting)
}
