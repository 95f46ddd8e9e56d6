//! Donut Object - intrusive strong/weak reference-counted objects
//!
//! This crate provides the object model used by components that hand
//! objects across module boundaries: capability queries through static
//! dispatch tables, strong ownership through [`AutoPtr`], and observation
//! through [`WeakPtr`] backed by a per-object control block.
//!
//! ```ignore
//! use donut_object::{blob, AutoPtr, IDataBlob};
//!
//! donut_object::init();
//! let blob: AutoPtr<dyn IDataBlob> = blob::create_blob(64)?;
//! let weak = blob.as_weak()?;
//! ```

pub mod guid;
pub mod status;
pub mod allocator;
pub mod sync;
pub mod object;
pub mod ptr;
pub mod blob;
pub mod config;
pub mod logging;

// Re-export core types
pub use guid::Guid;
pub use status::{ObjectError, Result, Status};
pub use allocator::{default_allocator, DebugInfo, MemoryAllocator};
pub use object::{
    ControlBlock, Factory, IObject, Interface, InterfaceEntry, InterfaceSlot, InterfaceTable,
    ManagedObject, ObjectInit, ObjectState, RefCountedBase, ObjectBase, DelegatingBase,
    WeakReference, IID_OBJECT,
};
pub use ptr::{AutoPtr, Related, WeakPtr};
pub use blob::{
    create_blob, create_blob_from, create_proxy_blob, create_proxy_blob_from_source,
    create_string_blob, create_string_blob_from, IDataBlob,
};

use config::Config;
use logging::LogConfig;

/// Library initialization
///
/// Installs the discovered configuration, starts logging and forces the
/// process-wide allocator and tracker. Safe to call more than once; only the
/// first call has an effect.
pub fn init() {
    config::install(Config::discover());
    let settings = config::current();

    logging::init_with_config(LogConfig::from_settings(&settings.logging).with_env());
    logging::log_init();

    allocator::init();
    object::tracker::init();
}

/// Library cleanup
///
/// Reports objects that are still alive; returns how many the tracker holds.
pub fn cleanup() -> usize {
    let leaked = object::tracker::dump();
    let objects = object::stats();
    logging::log_shutdown(objects.alive(), objects.blocks_freed);
    leaked
}

/// Combined allocator and object counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub allocator: allocator::AllocatorStats,
    pub objects: object::ObjectStats,
}

pub fn stats() -> RuntimeStats {
    RuntimeStats {
        allocator: allocator::stats(),
        objects: object::stats(),
    }
}
