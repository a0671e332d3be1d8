//! The generic multi-mode lock manager
//!
//! The manager protects a dynamic collection of records from simultaneous
//! access by concurrent transactions. Each record is identified by an
//! opaque key chosen by the caller; each transaction by a stable id. Lock
//! requests carry a mode, and the contention matrix decides which modes may
//! hold a record together.
//!
//! Unlike a standard mutex, the manager detects deadlocks between
//! transactions and recovers by denying one request: every waiter probes
//! the wait-for graph at a fixed tick, and on a cycle the victim policy
//! picks the transaction whose wait is broken.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::common::{Config, Result};
use crate::core::graph::DependencyGraph;
use crate::core::queue::{GroupId, LockRequestQueue, FIRST_GROUP_ID};
use crate::core::request::LockRequest;
use crate::core::signal::Signal;
use crate::matrix::ContentionMatrix;
use crate::policy::{SelectMax, VictimPolicy};

/// Lock table entry: the scheduling state of a single record.
///
/// The signal is shared through an `Arc` so a waiter can park on it after
/// the latch-guarded bookkeeping is done, and so unlock can broadcast
/// after releasing the latch.
struct LockTableEntry<T, M> {
    queue: LockRequestQueue<T, M>,
    signal: Arc<Signal>,
    granted_group_id: GroupId,
}

impl<T, M> LockTableEntry<T, M>
where
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            queue: LockRequestQueue::new(),
            signal: Arc::new(Signal::new()),
            // The first group created in a queue has this id, so a fresh
            // entry grants it immediately.
            granted_group_id: FIRST_GROUP_ID,
        }
    }
}

/// Everything the latch protects: the lock table and the wait-for graph.
/// The two are co-maintained; every queue mutation that changes who waits
/// on whom updates the graph in the same critical section.
struct State<R, T, M> {
    table: AHashMap<R, LockTableEntry<T, M>>,
    graph: DependencyGraph<T>,
}

impl<R, T, M> State<R, T, M>
where
    R: Eq + Hash + Clone,
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            table: AHashMap::new(),
            graph: DependencyGraph::new(),
        }
    }
}

/// Point-in-time snapshot of manager state, for monitoring and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockManagerStats {
    /// Records with at least one pending or granted request
    pub records: usize,
    /// Total requests across all queues
    pub requests: usize,
    /// Requests outside their record's granted group
    pub waiting: usize,
    /// Edges in the wait-for graph
    pub edges: usize,
}

impl LockManagerStats {
    /// Check that no request, entry, or dependency edge remains.
    pub fn is_idle(&self) -> bool {
        self.records == 0 && self.requests == 0 && self.waiting == 0 && self.edges == 0
    }
}

/// A synchronization primitive protecting many records with caller-defined
/// lock modes and deadlock recovery.
///
/// `lock` blocks until the request is granted or denied as a deadlock
/// victim; `unlock` releases a granted request and hands the record to the
/// next group in line. All bookkeeping synchronizes on one internal latch;
/// the only suspension point is the per-record wait signal.
pub struct LockManager<R, T, M, P = SelectMax> {
    matrix: ContentionMatrix<M>,
    tick: Duration,
    policy: P,
    state: Mutex<State<R, T, M>>,
}

impl<R, T, M, P> LockManager<R, T, M, P>
where
    R: Eq + Hash + Clone + fmt::Debug,
    T: Eq + Hash + Clone + fmt::Debug,
    M: Eq + Hash + Clone,
    P: VictimPolicy<T>,
{
    /// Construct a manager bound to an immutable contention matrix, with
    /// the default configuration.
    pub fn new(matrix: ContentionMatrix<M>) -> Self
    where
        P: Default,
    {
        Self {
            matrix,
            tick: Config::default().tick_interval,
            policy: P::default(),
            state: Mutex::new(State::new()),
        }
    }

    /// Construct a manager with a validated configuration.
    pub fn with_config(matrix: ContentionMatrix<M>, config: Config) -> Result<Self>
    where
        P: Default,
    {
        Self::with_policy(matrix, config, P::default())
    }

    /// Construct a manager with a validated configuration and an explicit
    /// victim selection policy.
    pub fn with_policy(
        matrix: ContentionMatrix<M>,
        config: Config,
        policy: P,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            matrix,
            tick: config.tick_interval,
            policy,
            state: Mutex::new(State::new()),
        })
    }

    /// Acquire a lock on a record in the given mode.
    ///
    /// Blocks the calling transaction until the lock is granted or the
    /// request is denied through deadlock recovery. Returns `true` iff the
    /// lock was acquired. A `false` return means either the request was
    /// denied as a deadlock victim, or the transaction already has a
    /// request in this record's queue (re-acquisition and upgrades are
    /// rejected outright).
    pub fn lock(&self, record_id: &R, transaction_id: &T, mode: &M) -> bool {
        let mut state = self.state.lock();

        let entry = state.table.entry(record_id.clone()).or_insert_with(|| {
            log::trace!("creating lock table entry for record {:?}", record_id);
            LockTableEntry::new()
        });

        let emplaced = entry
            .queue
            .insert(transaction_id.clone(), mode.clone(), &self.matrix);
        let group_id = match emplaced {
            Some(id) => id,
            // The transaction already has a request in this queue.
            None => return false,
        };
        if group_id == entry.granted_group_id {
            return true;
        }
        let signal = Arc::clone(&entry.signal);

        // The request landed behind the granted group, so the transaction
        // waits on every earlier request and every later arrival waits on
        // it. Record those dependencies, then park until the group is
        // granted or the request is denied, probing for deadlocks on each
        // tick.
        {
            let State { table, graph } = &mut *state;
            if let Some(entry) = table.get(record_id) {
                link_dependencies(&entry.queue, graph, transaction_id);
            }
        }
        signal.wait(
            &mut state,
            self.tick,
            |state| self.deadlock_probe(state, record_id, transaction_id),
            |state| Self::stop_waiting(state, record_id, transaction_id),
        );

        let denied = state
            .table
            .get(record_id)
            .and_then(|entry| entry.queue.request(transaction_id))
            .map_or(true, LockRequest::is_denied);
        if !denied {
            return true;
        }

        // Deadlock recovery denied this request. All of its dependencies
        // live in this record's queue, so cleanup is local: drop the edges
        // and the request, then repair the entry the same way unlock does.
        if let Some(signal) = self.discard_request(&mut state, record_id, transaction_id) {
            drop(state);
            signal.notify_all();
        }
        false
    }

    /// Release an acquired lock on a record.
    ///
    /// A no-op when the record has no entry, the transaction has no request
    /// there, or the request is not in the granted group; releasing a wait
    /// is not possible through this method.
    pub fn unlock(&self, record_id: &R, transaction_id: &T) {
        let mut state = self.state.lock();

        match state.table.get(record_id) {
            Some(entry) => {
                if entry.queue.group_id(transaction_id) != Some(entry.granted_group_id) {
                    return;
                }
            }
            None => return,
        }

        if let Some(signal) = self.discard_request(&mut state, record_id, transaction_id) {
            // Broadcasting without the latch lets the woken group re-acquire
            // it without immediately colliding with this thread.
            drop(state);
            signal.notify_all();
        }
    }

    /// Snapshot of current table and graph occupancy.
    pub fn stats(&self) -> LockManagerStats {
        let state = self.state.lock();
        let mut requests = 0;
        let mut waiting = 0;
        for entry in state.table.values() {
            requests += entry.queue.len();
            for (group_id, group) in entry.queue.iter() {
                if *group_id != entry.granted_group_id {
                    waiting += group.len();
                }
            }
        }
        LockManagerStats {
            records: state.table.len(),
            requests,
            waiting,
            edges: state.graph.edge_count(),
        }
    }

    /// Remove a transaction's request from a record's queue together with
    /// its wait-for edges, then repair the entry: drop it when the queue
    /// drained, or advance the granted group when the front moved.
    ///
    /// Shared by unlock and by denied-request cleanup; the granted-group
    /// repair keeps the `granted_group_id == front group` invariant in both
    /// paths. When the front moved, the entry's signal is returned so the
    /// caller can release the latch before broadcasting to the new holders.
    fn discard_request(
        &self,
        state: &mut State<R, T, M>,
        record_id: &R,
        transaction_id: &T,
    ) -> Option<Arc<Signal>> {
        let mut to_notify = None;
        let mut drained = false;

        let State { table, graph } = &mut *state;
        match table.get_mut(record_id) {
            Some(entry) => {
                if !entry.queue.contains(transaction_id) {
                    return None;
                }
                unlink_dependencies(&entry.queue, graph, transaction_id);
                entry.queue.remove(transaction_id);

                if entry.queue.is_empty() {
                    drained = true;
                } else if let Some(front) = entry.queue.front_group_id() {
                    if front != entry.granted_group_id {
                        entry.granted_group_id = front;
                        to_notify = Some(Arc::clone(&entry.signal));
                    }
                }
            }
            None => return None,
        }

        if drained {
            log::trace!("dropping drained lock table entry for record {:?}", record_id);
            table.remove(record_id);
        }
        to_notify
    }

    /// Predicate deciding when a waiter may leave the signal wait: its
    /// group reached the front, or deadlock recovery denied it. Defensive
    /// `true` on missing state so a waiter can never hang on a protocol
    /// violation.
    fn stop_waiting(state: &State<R, T, M>, record_id: &R, transaction_id: &T) -> bool {
        match state.table.get(record_id) {
            Some(entry) => {
                entry.queue.group_id(transaction_id) == Some(entry.granted_group_id)
                    || entry
                        .queue
                        .request(transaction_id)
                        .map_or(true, LockRequest::is_denied)
            }
            None => true,
        }
    }

    /// Search for a deadlock involving the waiting transaction and deny the
    /// victim's waits.
    ///
    /// Runs on every tick of a waiting transaction, latch held. When the
    /// cycle search from the waiter finds one, the policy selects a victim
    /// and every waiting request of that victim across the table is denied
    /// and its record's waiters woken. Granted requests of the victim are
    /// untouched; only waits are broken.
    fn deadlock_probe(&self, state: &mut State<R, T, M>, record_id: &R, transaction_id: &T) {
        // A denied waiter is already on its way out; probing again from it
        // would waste the tick.
        let denied = state
            .table
            .get(record_id)
            .and_then(|entry| entry.queue.request(transaction_id))
            .map_or(true, LockRequest::is_denied);
        if denied {
            return;
        }

        let cycle = state.graph.detect_cycle_from(transaction_id);
        if cycle.is_empty() {
            return;
        }
        let victim = match self.policy.select(&cycle) {
            Some(victim) => victim,
            None => return,
        };
        log::warn!(
            "deadlock among {} transactions, denying waits of victim {:?}",
            cycle.len(),
            victim
        );

        for entry in state.table.values_mut() {
            if let Some(group_id) = entry.queue.group_id(victim) {
                if group_id != entry.granted_group_id {
                    if let Some(request) = entry.queue.request_mut(victim) {
                        request.deny();
                        entry.signal.notify_all();
                    }
                }
            }
        }
    }
}

/// Insert the wait-for edges implied by a waiter's position in a queue:
/// the waiter depends on every request in a strictly earlier group, and
/// every request in a strictly later group depends on it. No edges are
/// created inside the waiter's own group and no self-edges exist.
fn link_dependencies<T, M>(
    queue: &LockRequestQueue<T, M>,
    graph: &mut DependencyGraph<T>,
    transaction_id: &T,
) where
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    let own_group = match queue.group_id(transaction_id) {
        Some(id) => id,
        None => return,
    };
    for (group_id, group) in queue.iter() {
        if *group_id == own_group {
            continue;
        }
        for (other, _) in group.iter() {
            if *group_id < own_group {
                graph.add(transaction_id.clone(), other.clone());
            } else {
                graph.add(other.clone(), transaction_id.clone());
            }
        }
    }
}

/// Remove the edges inserted by [`link_dependencies`] for this queue.
/// Edge removal is idempotent, so positions that never produced an edge
/// are harmless to visit.
fn unlink_dependencies<T, M>(
    queue: &LockRequestQueue<T, M>,
    graph: &mut DependencyGraph<T>,
    transaction_id: &T,
) where
    T: Eq + Hash + Clone,
    M: Eq + Hash + Clone,
{
    let own_group = match queue.group_id(transaction_id) {
        Some(id) => id,
        None => return,
    };
    for (group_id, group) in queue.iter() {
        if *group_id == own_group {
            continue;
        }
        for (other, _) in group.iter() {
            if *group_id < own_group {
                graph.remove_edge(transaction_id, other);
            } else {
                graph.remove_edge(other, transaction_id);
            }
        }
    }
}
