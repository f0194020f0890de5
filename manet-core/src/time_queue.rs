use crate::time::SimTime;
use core::cmp::Reverse;
use std::{
    collections::{BinaryHeap, HashSet},
    fmt,
};

/// Identifier of an entry in the [`TimeQueue`].
///
/// Identifiers are strictly increasing in submission order, this is
/// what breaks ties between two entries due at the same [`SimTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

/// A queue of items ordered by due time, then by submission order.
///
/// Cancelled entries are removed lazily: they stay in the heap until
/// they reach the front and are then discarded.
pub struct TimeQueue<T> {
    map: BinaryHeap<Reverse<OrderedByTime<T>>>,
    pending: HashSet<EventId>,
    next_id: u64,
}

struct OrderedByTime<T> {
    due: SimTime,
    id: EventId,
    item: T,
}

impl<T> OrderedByTime<T> {
    fn key(&self) -> (SimTime, EventId) {
        (self.due, self.id)
    }
}

impl<T> PartialEq for OrderedByTime<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for OrderedByTime<T> {}

impl<T> PartialOrd for OrderedByTime<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for OrderedByTime<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl<T> TimeQueue<T> {
    pub fn new() -> Self {
        Self {
            map: BinaryHeap::new(),
            pending: HashSet::new(),
            next_id: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// number of entries that are still due (cancelled ones excluded)
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn contains(&self, id: EventId) -> bool {
        self.pending.contains(&id)
    }

    /// due time of the next entry to pop
    pub fn next_due(&mut self) -> Option<SimTime> {
        self.discard_cancelled();
        self.map.peek().map(|Reverse(entry)| entry.due)
    }

    pub fn push(&mut self, due: SimTime, item: T) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;

        self.pending.insert(id);
        self.map.push(Reverse(OrderedByTime { due, id, item }));
        id
    }

    pub fn pop(&mut self) -> Option<(EventId, SimTime, T)> {
        self.discard_cancelled();
        let Reverse(OrderedByTime { due, id, item }) = self.map.pop()?;
        self.pending.remove(&id);
        Some((id, due, item))
    }

    /// Cancel an entry. Returns `false` if it already left the queue.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id)
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.map.peek() {
            if self.pending.contains(&entry.id) {
                break;
            }
            self.map.pop();
        }
    }
}

impl<T> Default for TimeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}
