//! Signal - resettable event carrying an integer payload
//!
//! Waiters block until the signal is triggered. With `auto_reset`, the last
//! of `n_waiting` expected waiters clears the signal on its way out so the
//! same instance can gate the next phase.

use crate::status::{ObjectError, Result};
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct SignalState {
    value: i32,
    waiting: usize,
    released: usize,
}

#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal to `value` (must be non-zero) and wake one or all waiters
    pub fn trigger(&self, notify_all: bool, value: i32) {
        debug_assert!(value != 0, "signal value must be non-zero");
        let mut state = self.state.lock();
        state.value = value;
        state.released = 0;
        drop(state);

        if notify_all {
            self.condvar.notify_all();
        } else {
            self.condvar.notify_one();
        }
    }

    /// Block until triggered and return the signal value
    ///
    /// With `auto_reset`, the signal is cleared once `n_waiting` threads have
    /// been released (a value of 0 or 1 clears it on the first wake).
    pub fn wait(&self, auto_reset: bool, n_waiting: usize) -> i32 {
        let mut state = self.state.lock();
        state.waiting += 1;
        while state.value == 0 {
            self.condvar.wait(&mut state);
        }
        Self::leave(&mut state, auto_reset, n_waiting)
    }

    /// Like [`Signal::wait`] without auto reset, giving up after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Result<i32> {
        let mut state = self.state.lock();
        state.waiting += 1;
        while state.value == 0 {
            if self.condvar.wait_for(&mut state, timeout).timed_out() && state.value == 0 {
                state.waiting -= 1;
                return Err(ObjectError::WaitTimeout);
            }
        }
        Ok(Self::leave(&mut state, false, 0))
    }

    fn leave(state: &mut SignalState, auto_reset: bool, n_waiting: usize) -> i32 {
        let value = state.value;
        state.waiting -= 1;
        state.released += 1;
        if auto_reset && state.released >= n_waiting.max(1) {
            state.value = 0;
            state.released = 0;
        }
        value
    }

    /// Clear the signal without waking anyone
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.value = 0;
        state.released = 0;
    }

    pub fn is_triggered(&self) -> bool {
        self.state.lock().value != 0
    }

    /// Threads currently blocked in `wait`
    pub fn waiting(&self) -> usize {
        self.state.lock().waiting
    }
}
