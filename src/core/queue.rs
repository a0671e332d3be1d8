//! Per-record queue of lock request groups
//!
//! The queue is the heart of scheduling. Requests arrive in chronological
//! order and are packed into groups: a newcomer joins the last group when
//! it agrees with every live member, otherwise it opens a new group behind
//! it. The front group is the granted one; groups behind it wait their
//! turn. Each request is also indexed on its transaction id for O(1)
//! lookup.

use std::hash::Hash;

use ahash::AHashMap;

use crate::core::group::LockRequestGroup;
use crate::core::indexed_map::IndexedMap;
use crate::core::request::LockRequest;
use crate::matrix::ContentionMatrix;

/// Identifier of a lock request group within a queue.
pub type GroupId = u64;

/// Identifier of the first group created in a queue.
pub const FIRST_GROUP_ID: GroupId = 1;

/// Chronologically ordered groups of lock requests for a single record.
///
/// Group ids increase monotonically over the life of the queue; gaps may
/// appear as emptied groups are dropped. Groups never split or merge after
/// creation, which keeps grant order fair: a request's group is fixed the
/// moment it arrives.
#[derive(Debug)]
pub struct LockRequestQueue<T, M> {
    groups: IndexedMap<GroupId, LockRequestGroup<T, M>>,
    index: AHashMap<T, GroupId>,
    len: usize,
}

impl<T, M> LockRequestQueue<T, M>
where
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            groups: IndexedMap::new(),
            index: AHashMap::new(),
            len: 0,
        }
    }

    /// Place a request into the queue.
    ///
    /// The request is checked for agreement with the last group; on
    /// agreement it joins that group, otherwise a new group is opened with
    /// the next id. Returns the id of the group the request landed in, or
    /// `None` when the transaction already has a request in this queue
    /// (double requests are rejected, which also rules out same-record
    /// upgrades).
    pub fn insert(
        &mut self,
        transaction_id: T,
        mode: M,
        matrix: &ContentionMatrix<M>,
    ) -> Option<GroupId> {
        if self.index.contains_key(&transaction_id) {
            return None;
        }

        let joined = match self.groups.back_mut() {
            Some((&id, group)) => {
                if group.try_insert(transaction_id.clone(), mode.clone(), matrix) {
                    Some(id)
                } else {
                    None
                }
            }
            None => None,
        };

        let group_id = match joined {
            Some(id) => id,
            None => {
                let next_id = self
                    .groups
                    .back()
                    .map_or(FIRST_GROUP_ID, |(&id, _)| id + 1);
                let mut group = LockRequestGroup::new();
                group.try_insert(transaction_id.clone(), mode, matrix);
                self.groups.push_back(next_id, group);
                next_id
            }
        };

        self.index.insert(transaction_id, group_id);
        self.len += 1;
        Some(group_id)
    }

    /// Look up the transaction's request.
    pub fn request(&self, transaction_id: &T) -> Option<&LockRequest<M>> {
        let group_id = self.index.get(transaction_id)?;
        self.groups.get(group_id)?.request(transaction_id)
    }

    /// Look up the transaction's request, mutably.
    pub fn request_mut(&mut self, transaction_id: &T) -> Option<&mut LockRequest<M>> {
        let group_id = *self.index.get(transaction_id)?;
        self.groups
            .get_mut(&group_id)?
            .request_mut(transaction_id)
    }

    /// Remove the transaction's request. An emptied group is dropped so
    /// the queue never holds an empty group.
    pub fn remove(&mut self, transaction_id: &T) -> Option<LockRequest<M>> {
        let group_id = *self.index.get(transaction_id)?;
        let group = self.groups.get_mut(&group_id)?;
        let request = group.remove(transaction_id)?;
        self.index.remove(transaction_id);

        let drained = group.is_empty();
        if drained {
            self.groups.remove(&group_id);
        }
        self.len -= 1;
        Some(request)
    }

    /// Check whether the transaction has a request in this queue.
    pub fn contains(&self, transaction_id: &T) -> bool {
        self.index.contains_key(transaction_id)
    }

    /// Id of the group holding the transaction's request.
    pub fn group_id(&self, transaction_id: &T) -> Option<GroupId> {
        self.index.get(transaction_id).copied()
    }

    /// Id of the front group, the one whose members hold the lock.
    pub fn front_group_id(&self) -> Option<GroupId> {
        self.groups.front().map(|(&id, _)| id)
    }

    /// Iterate over `(group id, group)` pairs in chronological order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&GroupId, &LockRequestGroup<T, M>)> {
        self.groups.iter()
    }

    /// Total number of requests across all groups.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<T, M> Default for LockRequestQueue<T, M>
where
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
