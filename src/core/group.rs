//! Group of lock requests that can be granted together

use std::hash::Hash;

use crate::core::indexed_map::{self, IndexedMap};
use crate::core::request::LockRequest;
use crate::matrix::ContentionMatrix;

/// An equivalence class of mutually-compatible lock requests.
///
/// All non-denied requests in a group are pairwise compatible under the
/// contention matrix, so the whole group can hold the lock simultaneously.
/// Denied requests stay in the group until their transaction wakes up and
/// cleans them up, but they are invisible to contention checks: a newcomer
/// compatible with the live members joins even when it conflicts with a
/// denied member.
#[derive(Debug)]
pub struct LockRequestGroup<T, M> {
    requests: IndexedMap<T, LockRequest<M>>,
}

impl<T, M> LockRequestGroup<T, M>
where
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            requests: IndexedMap::new(),
        }
    }

    /// Insert a request into the group if it agrees with every non-denied
    /// member. Returns `false` without inserting on contention, or when the
    /// transaction already has a request here.
    ///
    /// The contention check is directed: the newcomer is admitted iff
    /// `conflicts(member.mode, mode)` is `false` for every live member, so
    /// asymmetric matrices behave as declared.
    pub fn try_insert(
        &mut self,
        transaction_id: T,
        mode: M,
        matrix: &ContentionMatrix<M>,
    ) -> bool {
        for (_, request) in self.requests.iter() {
            if !request.is_denied() && matrix.conflicts(request.mode(), &mode) {
                return false;
            }
        }
        self.requests.push_back(transaction_id, LockRequest::new(mode))
    }

    pub fn request(&self, transaction_id: &T) -> Option<&LockRequest<M>> {
        self.requests.get(transaction_id)
    }

    pub fn request_mut(&mut self, transaction_id: &T) -> Option<&mut LockRequest<M>> {
        self.requests.get_mut(transaction_id)
    }

    /// Remove the transaction's request from the group.
    pub fn remove(&mut self, transaction_id: &T) -> Option<LockRequest<M>> {
        self.requests.remove(transaction_id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Iterate over `(transaction id, request)` pairs in arrival order.
    pub fn iter(&self) -> indexed_map::Iter<'_, T, LockRequest<M>> {
        self.requests.iter()
    }
}

impl<T, M> Default for LockRequestGroup<T, M>
where
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Mode {
        Read,
        Write,
    }

    fn read_write_matrix() -> ContentionMatrix<Mode> {
        ContentionMatrix::new()
            .with_conflict(Mode::Write, Mode::Write)
            .with_symmetric_conflict(Mode::Read, Mode::Write)
    }

    #[test]
    fn test_compatible_requests_share_group() {
        let matrix = read_write_matrix();
        let mut group = LockRequestGroup::new();

        assert!(group.try_insert(1u64, Mode::Read, &matrix));
        assert!(group.try_insert(2, Mode::Read, &matrix));
        assert!(group.try_insert(3, Mode::Read, &matrix));
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn test_conflicting_request_rejected() {
        let matrix = read_write_matrix();
        let mut group = LockRequestGroup::new();

        assert!(group.try_insert(1u64, Mode::Read, &matrix));
        assert!(!group.try_insert(2, Mode::Write, &matrix));
        assert_eq!(group.len(), 1);
        assert!(group.request(&2).is_none());
    }

    #[test]
    fn test_self_conflicting_mode_is_exclusive() {
        let matrix = read_write_matrix();
        let mut group = LockRequestGroup::new();

        assert!(group.try_insert(1u64, Mode::Write, &matrix));
        assert!(!group.try_insert(2, Mode::Write, &matrix));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_duplicate_transaction_rejected() {
        let matrix = read_write_matrix();
        let mut group = LockRequestGroup::new();

        assert!(group.try_insert(1u64, Mode::Read, &matrix));
        assert!(!group.try_insert(1, Mode::Read, &matrix));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_denied_member_does_not_contend() {
        let matrix = read_write_matrix();
        let mut group = LockRequestGroup::new();

        assert!(group.try_insert(1u64, Mode::Write, &matrix));
        group
            .request_mut(&1)
            .expect("request just inserted")
            .deny();

        // The denied writer no longer blocks a compatible newcomer, even
        // though their modes conflict.
        assert!(group.try_insert(2, Mode::Read, &matrix));
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_remove_and_empty() {
        let matrix = read_write_matrix();
        let mut group = LockRequestGroup::new();

        group.try_insert(1u64, Mode::Read, &matrix);
        group.try_insert(2, Mode::Read, &matrix);

        assert!(group.remove(&1).is_some());
        assert!(group.remove(&1).is_none());
        assert!(!group.is_empty());
        group.remove(&2);
        assert!(group.is_empty());
    }
}
