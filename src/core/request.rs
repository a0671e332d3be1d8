//! A single lock request

/// A lock request placed by a transaction for a record.
///
/// Carries the requested mode and a deny flag. The flag is raised when the
/// request is chosen as a deadlock victim; once raised, the request no
/// longer participates in contention checks within its group, and the
/// waiting transaction cleans it up on wakeup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest<M> {
    mode: M,
    denied: bool,
}

impl<M> LockRequest<M> {
    pub fn new(mode: M) -> Self {
        Self {
            mode,
            denied: false,
        }
    }

    pub fn mode(&self) -> &M {
        &self.mode
    }

    /// Mark the request as denied for deadlock recovery.
    pub fn deny(&mut self) {
        self.denied = true;
    }

    pub fn is_denied(&self) -> bool {
        self.denied
    }
}
