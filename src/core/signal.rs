//! Blocking wait with a periodic tick
//!
//! Wrapper around `parking_lot::Condvar` adding the wait shape the lock
//! manager needs: block until a predicate holds, but wake up after every
//! tick to run a callback with the latch re-held. The manager uses the
//! tick to drive deadlock probing at a fixed cadence while a transaction
//! waits for its request group to be granted.

use std::time::Duration;

use parking_lot::{Condvar, MutexGuard};

/// A condition signal with periodic tick callbacks.
#[derive(Debug, Default)]
pub struct Signal {
    cv: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self { cv: Condvar::new() }
    }

    /// Block the current thread until `stop` returns true.
    ///
    /// Atomically releases the latch behind `guard` and sleeps. The thread
    /// wakes on notification, after `tick` elapses, or spuriously; in every
    /// case the latch is re-acquired before anything else runs. On a tick
    /// timeout, `on_tick` is invoked with the latch held; `stop` is then
    /// re-checked and the wait resumes while it is still false. Spurious
    /// wakeups are harmless since `stop` alone gates exit.
    pub fn wait<S, C, P>(
        &self,
        guard: &mut MutexGuard<'_, S>,
        tick: Duration,
        mut on_tick: C,
        mut stop: P,
    ) where
        C: FnMut(&mut S),
        P: FnMut(&S) -> bool,
    {
        while !stop(&**guard) {
            if self.cv.wait_for(guard, tick).timed_out() {
                on_tick(&mut **guard);
            }
        }
    }

    /// Wake every thread waiting on this signal, returning how many were
    /// woken.
    pub fn notify_all(&self) -> usize {
        self.cv.notify_all()
    }

    /// Wake one waiting thread, if any.
    pub fn notify_one(&self) -> bool {
        self.cv.notify_one()
    }
}
