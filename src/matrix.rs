//! Contention matrix declaring which lock modes conflict
//!
//! The matrix is pure data: a boolean predicate over mode pairs. It is
//! constructed once and treated as immutable for the lifetime of a lock
//! manager, so it can be read concurrently without synchronization.

use std::hash::Hash;

use ahash::{AHashMap, AHashSet};

/// Boolean conflict predicate over pairs of lock modes.
///
/// `conflicts(a, b) == true` forbids coexistence of requests in modes `a`
/// and `b` within the same granted group. The relation is directed: the
/// matrix may be asymmetric, and admission checks evaluate exactly
/// `conflicts(existing_mode, new_mode)`. Self-conflict `conflicts(m, m)`
/// decides whether a mode is shareable: a self-conflicting mode forms
/// single-member groups (writer-like), a self-compatible mode lets many
/// requests share one group (reader-like).
///
/// For the classic read-write lock:
///
/// ```rust
/// use rslock::ContentionMatrix;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash)]
/// enum Mode {
///     Read,
///     Write,
/// }
///
/// let matrix = ContentionMatrix::new()
///     .with_conflict(Mode::Write, Mode::Write)
///     .with_symmetric_conflict(Mode::Read, Mode::Write);
///
/// assert!(!matrix.conflicts(&Mode::Read, &Mode::Read));
/// assert!(matrix.conflicts(&Mode::Read, &Mode::Write));
/// assert!(matrix.conflicts(&Mode::Write, &Mode::Write));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContentionMatrix<M> {
    conflicts: AHashMap<M, AHashSet<M>>,
}

impl<M> ContentionMatrix<M>
where
    M: Eq + Hash + Clone,
{
    /// Create an empty matrix in which no modes conflict.
    pub fn new() -> Self {
        Self {
            conflicts: AHashMap::new(),
        }
    }

    /// Create an empty matrix sized for a universe of `modes_count` modes.
    pub fn with_modes(modes_count: usize) -> Self {
        Self {
            conflicts: AHashMap::with_capacity(modes_count),
        }
    }

    /// Declare that an existing request in mode `held` blocks a newcomer in
    /// mode `requested`. The declaration is directed; use
    /// [`with_symmetric_conflict`](Self::with_symmetric_conflict) for the
    /// common symmetric case.
    pub fn with_conflict(mut self, held: M, requested: M) -> Self {
        self.conflicts.entry(held).or_default().insert(requested);
        self
    }

    /// Declare a conflict in both directions between modes `a` and `b`.
    pub fn with_symmetric_conflict(self, a: M, b: M) -> Self {
        self.with_conflict(a.clone(), b.clone()).with_conflict(b, a)
    }

    /// Check whether an existing request in mode `held` blocks a newcomer
    /// in mode `requested`.
    pub fn conflicts(&self, held: &M, requested: &M) -> bool {
        self.conflicts
            .get(held)
            .map_or(false, |blocked| blocked.contains(requested))
    }
}
