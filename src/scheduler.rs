use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Timers on a virtual clock. Timers due at the same instant fire in scheduling order.
/// Cancelled timers leave their heap entry behind; it is skipped when it surfaces.
#[derive(Debug)]
pub struct TimerQueue<E> {
    heap: BinaryHeap<Reverse<(Duration, u64)>>,
    pending: HashMap<u64, E>,
    next_seq: u64,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, event: E) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((due, seq)));
        self.pending.insert(seq, event);
        TimerId(seq)
    }

    pub fn cancel(&mut self, id: TimerId) -> Option<E> {
        self.pending.remove(&id.0)
    }

    pub fn next_due(&mut self) -> Option<Duration> {
        self.skip_cancelled();
        self.heap.peek().map(|Reverse((due, _))| *due)
    }

    /// Earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerId, E)> {
        self.skip_cancelled();
        let Reverse((due, seq)) = *self.heap.peek()?;
        if due > now {
            return None;
        }
        self.heap.pop();
        self.pending.remove(&seq).map(|event| (TimerId(seq), event))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn skip_cancelled(&mut self) {
        while let Some(Reverse((_, seq))) = self.heap.peek() {
            if self.pending.contains_key(seq) {
                break;
            }
            self.heap.pop();
        }
    }
}
