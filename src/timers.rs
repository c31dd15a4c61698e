//! Deferred work on a virtual clock.
//!
//! The host settles asynchronously (SPA renders, player geometry), so some
//! work runs a fixed delay after its trigger. Time only moves when the
//! embedding calls [`TimerQueue::drain_due`] with the current instant.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Fire a window resize so the host player recomputes its canvas.
    Resize,
    /// Re-run every page policy after navigation settles.
    ApplyAll,
}

#[derive(Debug)]
struct Entry<T> {
    due: Duration,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the earliest deadline, FIFO among equals.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Timer queue keyed by time since the embedding's epoch. Entries are never
/// cancelled.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    now: Duration,
    seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            now: Duration::ZERO,
            seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, task: T) {
        self.seq += 1;
        self.heap.push(Entry {
            due: self.now + delay,
            seq: self.seq,
            task,
        });
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.heap.peek().map(|entry| entry.due)
    }

    /// Advances the clock to `now` (never backwards) and returns every task
    /// due by then, earliest first.
    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        self.now = self.now.max(now);
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|entry| entry.due <= self.now)
        {
            if let Some(entry) = self.heap.pop() {
                due.push(entry.task);
            }
        }
        due
    }
}
