//! Alive-object tracking - registry of constructed, not yet destroyed objects
//!
//! Enabled through `objects.track_alive_objects`. Every object the factory
//! creates is registered with its debug info and removed right before its
//! destructor runs, so anything left at shutdown is a leak.

use crate::allocator::DebugInfo;
use crate::config;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::warn;

/// Object address -> allocation site
static ALIVE: Lazy<DashMap<usize, DebugInfo>> = Lazy::new(|| DashMap::with_capacity(64));

#[inline]
fn enabled() -> bool {
    config::current().objects.track_alive_objects
}

pub(crate) fn init() {
    Lazy::force(&ALIVE);
}

/// Register a freshly constructed object
#[inline]
pub fn add(object: *const u8, info: DebugInfo) {
    if enabled() {
        ALIVE.insert(object as usize, info);
    }
}

/// Unregister an object; returns whether it was tracked
#[inline]
pub fn remove(object: *const u8) -> bool {
    if !enabled() {
        return false;
    }
    ALIVE.remove(&(object as usize)).is_some()
}

pub fn is_tracked(object: *const u8) -> bool {
    ALIVE.contains_key(&(object as usize))
}

pub fn alive_count() -> usize {
    ALIVE.len()
}

/// Log every object still registered; returns how many there were
pub fn dump() -> usize {
    let mut count = 0;
    for entry in ALIVE.iter() {
        let info = entry.value();
        warn!(
            target: "object",
            ptr = ?(*entry.key() as *const u8),
            description = info.description,
            file = info.file,
            line = info.line,
            "object still alive"
        );
        count += 1;
    }
    count
}
