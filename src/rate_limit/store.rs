use std::collections::HashMap;

/// Per-identifier window state.
///
/// `window_start` is in milliseconds since the UNIX epoch and is always a multiple
/// of the owning tracker's window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    /// Events recorded in the window starting at `window_start`.
    pub current: u64,
    /// Events from the window immediately before; 0 when that window was not adjacent.
    pub previous: u64,
    /// Start of the current window (epoch millis).
    pub window_start: u64,
}

impl Counter {
    /// A counter holding a single event in `window_start`.
    pub fn first(window_start: u64) -> Self {
        Self { current: 1, previous: 0, window_start }
    }
}

/// Map of identifier to [`Counter`] plus purge bookkeeping.
///
/// Not synchronized; the owning tracker wraps it in a lock.
#[derive(Debug, Default)]
pub struct CounterStore {
    counters: HashMap<u64, Counter>,
    // Epoch millis at or after which the next sweep runs.
    next_purge: u64,
}

impl CounterStore {
    /// Empty store; the first purge check is due immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a counter.
    pub fn get(&self, id: u64) -> Option<&Counter> {
        self.counters.get(&id)
    }

    /// Look up a counter for update.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Counter> {
        self.counters.get_mut(&id)
    }

    /// Insert or replace a counter.
    pub fn insert(&mut self, id: u64, counter: Counter) {
        self.counters.insert(id, counter);
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Whether a sweep is due at `now_ms`.
    pub fn purge_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_purge
    }

    /// Drop every counter whose window started at or before `cutoff_ms` and schedule
    /// the next sweep for `next_purge_ms`. Returns how many counters were removed.
    pub fn purge(&mut self, cutoff_ms: u64, next_purge_ms: u64) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| c.window_start > cutoff_ms);
        self.next_purge = next_purge_ms;
        before - self.counters.len()
    }

    /// Push the next sweep out to `next_purge_ms` without removing anything.
    pub fn reschedule(&mut self, next_purge_ms: u64) {
        self.next_purge = next_purge_ms;
    }
}
