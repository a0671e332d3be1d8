//! # rslock: A Generic Multi-Mode Lock Manager in Rust
//!
//! `rslock` is a synchronization primitive that mediates concurrent access by
//! many transactions to a dynamic collection of independently-addressable
//! records. Unlike a plain mutex, each record admits lock requests in a
//! caller-defined set of modes, and a caller-supplied contention matrix
//! declares which pairs of modes conflict.
//!
//! ## Core Features
//!
//! - **Open-ended lock modes**: record, transaction, and mode types are all
//!   generic; semantics come entirely from the [`ContentionMatrix`]
//! - **Fair scheduling**: requests are grouped chronologically; compatible
//!   requests are granted together, incompatible ones wait in FIFO order
//! - **Deadlock recovery**: a wait-for graph is probed periodically; on a
//!   cycle, a victim policy picks one transaction whose request is denied
//! - **Scoped guards**: [`LockGuard`] pairs every acquisition with its
//!   release on all exit paths
//!
//! ## Example
//!
//! ```rust
//! use rslock::{ContentionMatrix, LockManager};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Mode {
//!     Read,
//!     Write,
//! }
//!
//! // Classic read-write contention: readers share, writers exclude.
//! let matrix = ContentionMatrix::new()
//!     .with_conflict(Mode::Write, Mode::Write)
//!     .with_symmetric_conflict(Mode::Read, Mode::Write);
//!
//! let manager: LockManager<u64, u64, Mode> = LockManager::new(matrix);
//!
//! assert!(manager.lock(&0, &1, &Mode::Read));
//! assert!(manager.lock(&0, &2, &Mode::Read));
//! // A second request from a still-holding transaction is rejected.
//! assert!(!manager.lock(&0, &1, &Mode::Write));
//!
//! manager.unlock(&0, &1);
//! manager.unlock(&0, &2);
//! assert_eq!(manager.stats().records, 0);
//! ```

pub mod common;
pub mod core;
pub mod guard;
pub mod manager;
pub mod matrix;
pub mod policy;

// Re-export commonly used types
pub use crate::common::{Config, LockError, Result};
pub use crate::core::queue::GroupId;
pub use crate::guard::LockGuard;
pub use crate::manager::{LockManager, LockManagerStats};
pub use crate::matrix::ContentionMatrix;
pub use crate::policy::{SelectMax, SelectMin, VictimPolicy};
