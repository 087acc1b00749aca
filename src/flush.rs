//! Flush policy configuration for write-mode streams.
//!
//! Controls when bytes written through a stream are pushed to disk without an
//! explicit `flush()` call.

/// Policy controlling when to flush dirty pages to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Never flush implicitly; flush() must be called by the user.
    #[default]
    Never,
    /// Flush after every write call.
    Always,
    /// Flush when at least N bytes have been written since the last flush.
    /// A threshold of 0 behaves exactly like `Always`.
    EveryBytes(usize),
    /// Flush after every W write calls. A threshold of 0 behaves exactly like `Always`.
    EveryWrites(usize),
}

/// Counts writes since the last flush and decides when the policy fires.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlushTracker {
    policy: FlushPolicy,
    bytes: usize,
    writes: usize,
}

impl FlushTracker {
    pub(crate) fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            bytes: 0,
            writes: 0,
        }
    }

    pub(crate) fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Record one committed write of `len` bytes. Returns true when a flush is due.
    pub(crate) fn record(&mut self, len: usize) -> bool {
        self.bytes = self.bytes.saturating_add(len);
        self.writes = self.writes.saturating_add(1);
        match self.policy {
            FlushPolicy::Never => false,
            FlushPolicy::Always | FlushPolicy::EveryBytes(0) | FlushPolicy::EveryWrites(0) => true,
            FlushPolicy::EveryBytes(n) => self.bytes >= n,
            FlushPolicy::EveryWrites(n) => self.writes >= n,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.bytes = 0;
        self.writes = 0;
    }
}
