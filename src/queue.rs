//! FIFO run queue with max-priority selection

use crate::record::ThreadId;
use std::collections::VecDeque;

/// Ordered queue of thread identities
///
/// Insertion order is preserved; the max-priority scan is O(n) by design and
/// keeps the earliest entry among equal priorities (only a strictly greater
/// priority displaces the current candidate). Priorities are immutable for a
/// thread's lifetime, so they are stored alongside the identity rather than
/// looked up in the arena on every scan.
///
/// The queue holds no lock: all mutation is serialized by the engine's state
/// lock and, above that, by the token-holder discipline.
#[derive(Debug, Default)]
pub struct RunQueue {
    entries: VecDeque<(ThreadId, u32)>,
}

impl RunQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append a thread at the tail
    pub fn push(&mut self, id: ThreadId, priority: u32) {
        self.entries.push_back((id, priority));
    }

    /// Unlink a thread by identity; returns whether it was present
    pub fn remove(&mut self, id: ThreadId) -> bool {
        if let Some(pos) = self.entries.iter().position(|&(entry, _)| entry == id) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Find the highest-priority thread, earliest-enqueued on ties
    pub fn peek_max_priority(&self) -> Option<(ThreadId, u32)> {
        let mut max: Option<(ThreadId, u32)> = None;
        for &(id, priority) in &self.entries {
            match max {
                Some((_, best)) if priority <= best => {}
                _ => max = Some((id, priority)),
            }
        }
        max
    }

    /// Whether the queue holds no threads
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued threads
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over queued identities in FIFO order
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.entries.iter().map(|&(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_queue() {
        let queue = RunQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.peek_max_priority(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = RunQueue::new();
        let a = ThreadId::new();
        let b = ThreadId::new();
        let c = ThreadId::new();

        queue.push(a, 1);
        queue.push(b, 2);
        queue.push(c, 3);

        let order: Vec<_> = queue.iter().collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn test_remove_by_identity() {
        let mut queue = RunQueue::new();
        let a = ThreadId::new();
        let b = ThreadId::new();

        queue.push(a, 1);
        queue.push(b, 2);

        assert!(queue.remove(a));
        assert!(!queue.remove(a));
        assert_eq!(queue.len(), 1);

        let order: Vec<_> = queue.iter().collect();
        assert_eq!(order, vec![b]);
    }

    #[test]
    fn test_peek_max_priority() {
        let mut queue = RunQueue::new();
        let a = ThreadId::new();
        let b = ThreadId::new();
        let c = ThreadId::new();

        queue.push(a, 1);
        queue.push(b, 4);
        queue.push(c, 2);

        assert_eq!(queue.peek_max_priority(), Some((b, 4)));
    }

    #[test]
    fn test_max_priority_tie_keeps_earliest() {
        let mut queue = RunQueue::new();
        let a = ThreadId::new();
        let b = ThreadId::new();
        let c = ThreadId::new();

        queue.push(a, 3);
        queue.push(b, 3);
        queue.push(c, 1);

        // a and b tie at priority 3; a was enqueued first and must win
        assert_eq!(queue.peek_max_priority(), Some((a, 3)));

        queue.remove(a);
        assert_eq!(queue.peek_max_priority(), Some((b, 3)));
    }

    #[test]
    fn test_tie_break_after_requeue() {
        let mut queue = RunQueue::new();
        let a = ThreadId::new();
        let b = ThreadId::new();

        queue.push(a, 2);
        queue.push(b, 2);

        // Requeueing a at the tail makes b the earliest of the tie
        queue.remove(a);
        queue.push(a, 2);
        assert_eq!(queue.peek_max_priority(), Some((b, 2)));
    }
}
