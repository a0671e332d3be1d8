//! Common types, error definitions and configuration for rslock
//!
//! This module contains the error enum, result alias and runtime
//! configuration used throughout the lock manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Interval between deadlock probes while a transaction waits.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(300);

/// Error types for rslock operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Lock called on a guard that already owns its mutex
    #[error("guard already owns the lock")]
    AlreadyHeld,

    /// Unlock called on a guard that does not own its mutex
    #[error("guard does not own the lock")]
    NotHeld,

    /// Lock or unlock called on a guard with no associated manager
    #[error("guard references no lock manager")]
    NullMutex,

    /// A looked-up key was absent from an internal container. Signals a
    /// protocol violation and should not surface on a correct caller path.
    #[error("internal lookup miss")]
    Missing,

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl LockError {
    /// Check if this error is a caller bug on the guard protocol
    pub fn is_guard_misuse(&self) -> bool {
        matches!(
            self,
            LockError::AlreadyHeld | LockError::NotHeld | LockError::NullMutex
        )
    }
}

/// Result type alias for rslock operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Configuration for a lock manager instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interval between deadlock probes while a transaction waits. A waiter
    /// wakes up after every tick, runs a cycle search from itself over the
    /// wait-for graph, and goes back to sleep if its request is still
    /// pending.
    pub tick_interval: Duration,
}

impl Config {
    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval < Duration::from_millis(1) {
            return Err(LockError::InvalidConfig {
                message: "Tick interval must be at least 1ms".to_string(),
            });
        }

        if self.tick_interval > Duration::from_secs(5) {
            log::warn!(
                "Tick interval of {:?} is unusually long, deadlocked transactions \
                 will stall until the next probe",
                self.tick_interval
            );
        }

        Ok(())
    }

    /// Create a configuration with the given deadlock probe interval
    pub fn with_tick_interval(tick_interval: Duration) -> Result<Self> {
        let config = Self { tick_interval };
        config.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}
