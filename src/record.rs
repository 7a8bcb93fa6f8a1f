//! Thread records and the per-thread handshake primitives

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a logical thread
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ThreadId(u64);

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

impl ThreadId {
    /// Allocate a new unique ThreadId
    pub fn new() -> Self {
        ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a logical thread
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ThreadState {
    /// Enqueued and eligible for dispatch
    Ready,
    /// Holds the run token and is executing user code
    Running,
    /// Blocked on an I/O event class until a matching `signal`
    Waiting,
    /// Handler returned; the thread will never run again
    Terminated,
}

/// The scheduling unit: one record per logical thread
///
/// The record lives in the engine's arena and is only ever mutated by the
/// token holder (under the engine's state lock). The run channel is the
/// thread's half of the token handoff: the engine grants the token by
/// sending on `run_tx`, and the thread's carrier (or a public operation
/// executing on it) parks by receiving on `run_rx`. The channel holds a
/// single slot so a grant never blocks the granter; at most one grant is
/// outstanding per thread.
pub struct ThreadRecord {
    /// Unique identifier
    id: ThreadId,

    /// Scheduling priority, immutable for the thread's lifetime
    priority: u32,

    /// Ticks left before the thread becomes eligible for preemption
    pub(crate) remaining: u32,

    /// I/O event class this thread is blocked on, if WAITING
    pub(crate) io: Option<u32>,

    /// Current state
    pub(crate) state: ThreadState,

    /// Engine side of the token handoff
    pub(crate) run_tx: Sender<()>,

    /// Thread side of the token handoff
    pub(crate) run_rx: Receiver<()>,
}

impl ThreadRecord {
    /// Create a record in the READY-pending state with a full quantum
    pub(crate) fn new(id: ThreadId, priority: u32, time_quantum: u32) -> Self {
        let (run_tx, run_rx) = bounded(1);
        Self {
            id,
            priority,
            remaining: time_quantum,
            io: None,
            state: ThreadState::Ready,
            run_tx,
            run_rx,
        }
    }

    /// Get the thread's unique ID
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Get the thread's priority
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Get the remaining quantum
    pub fn remaining_quantum(&self) -> u32 {
        self.remaining
    }

    /// Get the I/O event class this thread is blocked on, if any
    pub fn io_class(&self) -> Option<u32> {
        self.io
    }

    /// Get the current state
    pub fn state(&self) -> ThreadState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_uniqueness() {
        let id1 = ThreadId::new();
        let id2 = ThreadId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn test_record_creation() {
        let id = ThreadId::new();
        let record = ThreadRecord::new(id, 3, 4);

        assert_eq!(record.id(), id);
        assert_eq!(record.priority(), 3);
        assert_eq!(record.remaining_quantum(), 4);
        assert_eq!(record.io_class(), None);
        assert_eq!(record.state(), ThreadState::Ready);
    }

    #[test]
    fn test_run_channel_single_slot() {
        let record = ThreadRecord::new(ThreadId::new(), 0, 1);

        // One grant fits without a receiver parked
        assert!(record.run_tx.try_send(()).is_ok());
        // A second would mean two outstanding grants
        assert!(record.run_tx.try_send(()).is_err());

        assert!(record.run_rx.try_recv().is_ok());
        assert!(record.run_rx.try_recv().is_err());
    }
}
