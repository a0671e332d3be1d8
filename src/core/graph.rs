//! Wait-for dependency graph between transactions
//!
//! Edge `a -> b` means transaction `a` is blocked pending transaction `b`'s
//! progress. The lock manager co-maintains this graph with its request
//! queues under the latch; the deadlock probe searches it for cycles from
//! the waiting transaction.

use std::hash::Hash;

use ahash::{AHashMap, AHashSet};

/// Visit state of a vertex during a cycle search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Visiting,
    Visited,
}

/// One frame of the explicit depth-first search stack.
#[derive(Debug)]
struct Frame<T> {
    node: T,
    successors: Vec<T>,
    cursor: usize,
}

/// Directed graph of waits-for edges between transactions.
///
/// At most one edge exists per ordered pair; `add` is idempotent and
/// `remove_edge` is a no-op for absent edges, so callers may re-derive the
/// edge set from queue positions without tracking what was added before.
#[derive(Debug)]
pub struct DependencyGraph<T> {
    edges: AHashMap<T, AHashSet<T>>,
}

impl<T> DependencyGraph<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            edges: AHashMap::new(),
        }
    }

    /// Add edge `from -> to`. Duplicate calls have no effect.
    pub fn add(&mut self, from: T, to: T) {
        self.edges.entry(from).or_default().insert(to);
    }

    /// Remove edge `from -> to` if it exists. A vertex with no remaining
    /// outgoing edges is dropped from the adjacency map.
    pub fn remove_edge(&mut self, from: &T, to: &T) {
        if let Some(successors) = self.edges.get_mut(from) {
            successors.remove(to);
            if successors.is_empty() {
                self.edges.remove(from);
            }
        }
    }

    /// Remove a vertex and every edge incident to it.
    pub fn remove_vertex(&mut self, id: &T) {
        self.edges.remove(id);
        self.edges.retain(|_, successors| {
            successors.remove(id);
            !successors.is_empty()
        });
    }

    /// Check for edge `from -> to`.
    pub fn has_edge(&self, from: &T, to: &T) -> bool {
        self.edges
            .get(from)
            .map_or(false, |successors| successors.contains(to))
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|s| s.len()).sum()
    }

    /// Check whether the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Search for a cycle reachable from `start`, returning the vertices on
    /// the first cycle found, or an empty vector when none exists.
    ///
    /// The search is a depth-first traversal over outgoing edges with an
    /// explicit stack, so deep dependency chains cannot overflow the thread
    /// stack. Vertices are colored not-visited, visiting, or visited; a
    /// cycle exists iff the traversal reaches a visiting vertex, and its
    /// members are reconstructed by walking parent pointers from the hit
    /// vertex back to itself. Runs in O(V + E) with fresh color and parent
    /// maps per call.
    pub fn detect_cycle_from(&self, start: &T) -> Vec<T> {
        let mut colors: AHashMap<T, Visit> = AHashMap::new();
        let mut parents: AHashMap<T, T> = AHashMap::new();
        let mut stack: Vec<Frame<T>> = Vec::new();

        colors.insert(start.clone(), Visit::Visiting);
        stack.push(Frame {
            node: start.clone(),
            successors: self.successors_of(start),
            cursor: 0,
        });

        while let Some(frame) = stack.last_mut() {
            if frame.cursor < frame.successors.len() {
                let child = frame.successors[frame.cursor].clone();
                frame.cursor += 1;

                match colors.get(&child) {
                    Some(Visit::Visited) => {}
                    Some(Visit::Visiting) => {
                        // The edge frame.node -> child closes a cycle; the
                        // members are child and everything on the parent
                        // chain from frame.node back to child.
                        let mut cycle = vec![child.clone()];
                        let mut node = frame.node.clone();
                        while node != child {
                            cycle.push(node.clone());
                            match parents.get(&node) {
                                Some(parent) => node = parent.clone(),
                                None => break,
                            }
                        }
                        return cycle;
                    }
                    None => {
                        parents.insert(child.clone(), frame.node.clone());
                        colors.insert(child.clone(), Visit::Visiting);
                        let successors = self.successors_of(&child);
                        stack.push(Frame {
                            node: child,
                            successors,
                            cursor: 0,
                        });
                    }
                }
            } else {
                colors.insert(frame.node.clone(), Visit::Visited);
                stack.pop();
            }
        }

        Vec::new()
    }

    fn successors_of(&self, node: &T) -> Vec<T> {
        self.edges
            .get(node)
            .map(|successors| successors.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl<T> Default for DependencyGraph<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut cycle: Vec<u64>) -> Vec<u64> {
        cycle.sort_unstable();
        cycle
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 2);
        graph.add(1, 2);
        assert!(graph.has_edge(&1, &2));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 2);
        graph.add(1, 3);

        graph.remove_edge(&1, &2);
        assert!(!graph.has_edge(&1, &2));
        assert!(graph.has_edge(&1, &3));

        // Absent edges are a no-op.
        graph.remove_edge(&1, &2);
        graph.remove_edge(&7, &8);

        graph.remove_edge(&1, &3);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_remove_vertex() {
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 2);
        graph.add(2, 3);
        graph.add(3, 2);

        graph.remove_vertex(&2);
        assert!(!graph.has_edge(&1, &2));
        assert!(!graph.has_edge(&2, &3));
        assert!(!graph.has_edge(&3, &2));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_no_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 2);
        graph.add(2, 3);
        graph.add(1, 3);
        assert!(graph.detect_cycle_from(&1).is_empty());
        assert!(graph.detect_cycle_from(&3).is_empty());
    }

    #[test]
    fn test_self_loop() {
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 1);
        assert_eq!(graph.detect_cycle_from(&1), vec![1]);
    }

    #[test]
    fn test_two_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 2);
        graph.add(2, 1);
        assert_eq!(sorted(graph.detect_cycle_from(&1)), vec![1, 2]);
        assert_eq!(sorted(graph.detect_cycle_from(&2)), vec![1, 2]);
    }

    #[test]
    fn test_cycle_is_exact() {
        // 1 -> 2 -> 3 -> 4 -> 2: the cycle is {2, 3, 4}, reached from 1
        // but not containing it.
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 2);
        graph.add(2, 3);
        graph.add(3, 4);
        graph.add(4, 2);

        assert_eq!(sorted(graph.detect_cycle_from(&1)), vec![2, 3, 4]);
        assert_eq!(sorted(graph.detect_cycle_from(&2)), vec![2, 3, 4]);
    }

    #[test]
    fn test_cycle_with_branches() {
        let mut graph = DependencyGraph::new();
        // Dead-end branch off the cycle.
        graph.add(1u64, 5);
        graph.add(5, 6);
        // The actual cycle.
        graph.add(1, 2);
        graph.add(2, 3);
        graph.add(3, 1);

        assert_eq!(sorted(graph.detect_cycle_from(&1)), vec![1, 2, 3]);
        // A vertex off the cycle with no path to it sees nothing.
        assert!(graph.detect_cycle_from(&5).is_empty());
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        // A chain long enough to blow the thread stack under recursion,
        // ending in a cycle back to the chain's tail.
        let mut graph = DependencyGraph::new();
        const DEPTH: u64 = 100_000;
        for id in 0..DEPTH {
            graph.add(id, id + 1);
        }
        graph.add(DEPTH, DEPTH - 1);

        let cycle = graph.detect_cycle_from(&0);
        assert_eq!(sorted(cycle), vec![DEPTH - 1, DEPTH]);
    }

    #[test]
    fn test_detection_leaves_graph_intact() {
        let mut graph = DependencyGraph::new();
        graph.add(1u64, 2);
        graph.add(2, 1);

        graph.detect_cycle_from(&1);
        graph.detect_cycle_from(&1);
        assert!(graph.has_edge(&1, &2));
        assert!(graph.has_edge(&2, &1));
        assert_eq!(graph.edge_count(), 2);
    }
}
