//! The runqueue: a bounded FIFO queue or a bounded max-heap priority queue
//! of ready thread ids, matching whichever policy `init` selected.
//!
//! The generic container work is deliberately thin -- a `VecDeque` and a
//! `BinaryHeap` already are the bounded integer queue and priority queue
//! this module's contract calls for; the only value this type adds is
//! enforcing the shared capacity and picking the active policy's ordering.

use std::collections::{BinaryHeap, VecDeque};

use crate::config::{MAX_THREADS, SchedPolicy};
use crate::tcb::ThreadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFull;

#[derive(PartialEq, Eq)]
struct PriorityEntry {
    priority: i32,
    // Breaks ties in favor of older entries. The tie-break itself is not a
    // contract the rest of the library may rely on (`queue ties are
    // unspecified` per the scheduling policy notes); it exists only so
    // repeated test runs are deterministic.
    sequence: u64,
    id: ThreadId,
}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) enum RunQueue {
    Fifo(VecDeque<ThreadId>),
    Priority(BinaryHeap<PriorityEntry>, u64),
}

impl RunQueue {
    pub(crate) fn new(policy: SchedPolicy) -> Self {
        match policy {
            SchedPolicy::Priority => RunQueue::Priority(BinaryHeap::new(), 0),
            _ => RunQueue::Fifo(VecDeque::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            RunQueue::Fifo(q) => q.len(),
            RunQueue::Priority(q, _) => q.len(),
        }
    }

    /// Enqueue `id` at `priority`. Fails only on overflow, which the
    /// scheduler treats as a fatal invariant violation -- the thread table
    /// caps live threads at `MAX_THREADS`, so a full runqueue means the
    /// bookkeeping has already diverged from reality.
    pub(crate) fn enqueue(&mut self, id: ThreadId, priority: i32) -> Result<(), QueueFull> {
        if self.len() >= MAX_THREADS {
            return Err(QueueFull);
        }
        match self {
            RunQueue::Fifo(q) => q.push_back(id),
            RunQueue::Priority(q, seq) => {
                q.push(PriorityEntry {
                    priority,
                    sequence: *seq,
                    id,
                });
                *seq += 1;
            }
        }
        Ok(())
    }

    pub(crate) fn dequeue(&mut self) -> Option<ThreadId> {
        match self {
            RunQueue::Fifo(q) => q.pop_front(),
            RunQueue::Priority(q, _) => q.pop().map(|e| e.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_preserves_enqueue_order() {
        let mut q = RunQueue::new(SchedPolicy::Fifo);
        q.enqueue(ThreadId(1), 0).unwrap();
        q.enqueue(ThreadId(2), 0).unwrap();
        assert_eq!(q.dequeue(), Some(ThreadId(1)));
        assert_eq!(q.dequeue(), Some(ThreadId(2)));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn priority_dispatches_highest_first() {
        let mut q = RunQueue::new(SchedPolicy::Priority);
        q.enqueue(ThreadId(1), -5).unwrap();
        q.enqueue(ThreadId(2), 10).unwrap();
        q.enqueue(ThreadId(3), 0).unwrap();
        assert_eq!(q.dequeue(), Some(ThreadId(2)));
        assert_eq!(q.dequeue(), Some(ThreadId(3)));
        assert_eq!(q.dequeue(), Some(ThreadId(1)));
    }

    #[test]
    fn rejects_enqueue_past_capacity() {
        let mut q = RunQueue::new(SchedPolicy::Fifo);
        for i in 0..MAX_THREADS {
            q.enqueue(ThreadId(i as u32), 0).unwrap();
        }
        assert_eq!(q.enqueue(ThreadId(200), 0), Err(QueueFull));
    }
}
