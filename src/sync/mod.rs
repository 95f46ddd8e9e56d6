//! Synchronization primitives - short critical sections and thread barriers
//!
//! - [`SpinLock`]: busy-wait mutex guarding control-block transitions
//! - [`Signal`]: resettable event used to line threads up in stress tests

mod spin;
mod signal;


pub use spin::{RawSpinLock, SpinLock, SpinLockGuard};
pub use signal::Signal;
