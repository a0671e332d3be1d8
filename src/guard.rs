//! Scoped ownership wrapper for a single lock acquisition
//!
//! A guard binds one `(record, transaction, mode)` triple to a lock
//! manager and guarantees that an acquired lock is released exactly once,
//! on every exit path. The guard has three observable states: not owned
//! (no acquisition attempted, or already released), owned (the lock is
//! held), and denied (the acquisition was refused to recover from a
//! deadlock, which implies not owned).

use std::fmt;
use std::hash::Hash;

use crate::common::{LockError, Result};
use crate::manager::LockManager;
use crate::policy::{SelectMax, VictimPolicy};

/// RAII-style ownership of one lock on one record.
///
/// Dropping a guard that owns its lock releases it. Guards move freely;
/// the moved-from value no longer owns anything. Copying is not possible,
/// which keeps the release-exactly-once contract trivially true.
pub struct LockGuard<'m, R, T, M, P = SelectMax>
where
    R: Eq + Hash + Clone + fmt::Debug,
    T: Eq + Hash + Clone + fmt::Debug,
    M: Eq + Hash + Clone,
    P: VictimPolicy<T>,
{
    manager: Option<&'m LockManager<R, T, M, P>>,
    record_id: R,
    transaction_id: T,
    mode: M,
    owns: bool,
    denied: bool,
}

impl<'m, R, T, M, P> LockGuard<'m, R, T, M, P>
where
    R: Eq + Hash + Clone + fmt::Debug,
    T: Eq + Hash + Clone + fmt::Debug,
    M: Eq + Hash + Clone,
    P: VictimPolicy<T>,
{
    /// Acquire the lock immediately, blocking until it is granted or
    /// denied. Inspect [`owns`](Self::owns) or [`is_denied`](Self::is_denied)
    /// for the outcome.
    pub fn new(
        manager: &'m LockManager<R, T, M, P>,
        record_id: R,
        transaction_id: T,
        mode: M,
    ) -> Self {
        let owns = manager.lock(&record_id, &transaction_id, &mode);
        Self {
            manager: Some(manager),
            record_id,
            transaction_id,
            mode,
            owns,
            denied: !owns,
        }
    }

    /// Bind to a manager without acquiring; call [`lock`](Self::lock)
    /// later.
    pub fn deferred(
        manager: &'m LockManager<R, T, M, P>,
        record_id: R,
        transaction_id: T,
        mode: M,
    ) -> Self {
        Self {
            manager: Some(manager),
            record_id,
            transaction_id,
            mode,
            owns: false,
            denied: false,
        }
    }

    /// Take over a lock the caller already acquired through
    /// [`LockManager::lock`]; the guard becomes responsible for releasing
    /// it.
    pub fn adopted(
        manager: &'m LockManager<R, T, M, P>,
        record_id: R,
        transaction_id: T,
        mode: M,
    ) -> Self {
        Self {
            manager: Some(manager),
            record_id,
            transaction_id,
            mode,
            owns: true,
            denied: false,
        }
    }

    /// Acquire the lock on the associated manager.
    ///
    /// Returns `Ok(true)` when granted and `Ok(false)` when denied for
    /// deadlock recovery. Calling this on a guard that already owns its
    /// lock or that has no manager is a caller bug and fails with
    /// [`LockError::AlreadyHeld`] or [`LockError::NullMutex`].
    pub fn lock(&mut self) -> Result<bool> {
        let manager = self.manager.ok_or(LockError::NullMutex)?;
        if self.owns {
            return Err(LockError::AlreadyHeld);
        }
        self.owns = manager.lock(&self.record_id, &self.transaction_id, &self.mode);
        self.denied = !self.owns;
        Ok(self.owns)
    }

    /// Release the owned lock.
    ///
    /// Fails with [`LockError::NotHeld`] when the guard does not own its
    /// lock.
    pub fn unlock(&mut self) -> Result<()> {
        if !self.owns {
            return Err(LockError::NotHeld);
        }
        let manager = self.manager.ok_or(LockError::NullMutex)?;
        // owns implies !denied, so only the ownership flag needs clearing.
        self.owns = false;
        manager.unlock(&self.record_id, &self.transaction_id);
        Ok(())
    }

    /// Disassociate the guard from its manager without unlocking.
    ///
    /// If a lock is held, the caller becomes responsible for releasing it;
    /// the returned manager reference is there for exactly that.
    pub fn release(&mut self) -> Option<&'m LockManager<R, T, M, P>> {
        self.owns = false;
        self.denied = false;
        self.manager.take()
    }

    /// Check whether the guard owns its lock.
    pub fn owns(&self) -> bool {
        self.owns
    }

    /// Check whether the most recent acquisition was denied to recover
    /// from a deadlock. A denied guard does not own its lock.
    pub fn is_denied(&self) -> bool {
        self.denied
    }

    /// `true` iff the lock is held: owned and not denied.
    pub fn is_locked(&self) -> bool {
        self.owns && !self.denied
    }

    pub fn record_id(&self) -> &R {
        &self.record_id
    }

    pub fn transaction_id(&self) -> &T {
        &self.transaction_id
    }

    pub fn mode(&self) -> &M {
        &self.mode
    }

    /// The associated manager, if the guard is still bound to one.
    pub fn mutex(&self) -> Option<&'m LockManager<R, T, M, P>> {
        self.manager
    }
}

impl<'m, R, T, M, P> Drop for LockGuard<'m, R, T, M, P>
where
    R: Eq + Hash + Clone + fmt::Debug,
    T: Eq + Hash + Clone + fmt::Debug,
    M: Eq + Hash + Clone,
    P: VictimPolicy<T>,
{
    fn drop(&mut self) {
        if self.owns {
            if let Some(manager) = self.manager {
                manager.unlock(&self.record_id, &self.transaction_id);
            }
        }
    }
}

impl<'m, R, T, M, P> Default for LockGuard<'m, R, T, M, P>
where
    R: Eq + Hash + Clone + fmt::Debug + Default,
    T: Eq + Hash + Clone + fmt::Debug + Default,
    M: Eq + Hash + Clone + Default,
    P: VictimPolicy<T>,
{
    /// A guard bound to nothing; [`lock`](Self::lock) fails with
    /// [`LockError::NullMutex`] until the value is replaced.
    fn default() -> Self {
        Self {
            manager: None,
            record_id: R::default(),
            transaction_id: T::default(),
            mode: M::default(),
            owns: false,
            denied: false,
        }
    }
}

impl<'m, R, T, M, P> fmt::Debug for LockGuard<'m, R, T, M, P>
where
    R: Eq + Hash + Clone + fmt::Debug,
    T: Eq + Hash + Clone + fmt::Debug,
    M: Eq + Hash + Clone,
    P: VictimPolicy<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("record_id", &self.record_id)
            .field("transaction_id", &self.transaction_id)
            .field("owns", &self.owns)
            .field("denied", &self.denied)
            .finish()
    }
}
