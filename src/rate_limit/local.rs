use crate::clock::{duration_millis, epoch_millis};
use crate::error::{ConfigError, TrackerError};
use crate::rate_limit::store::{Counter, CounterStore};
use crate::rate_limit::LimitTracker;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// How often stale counters are swept when no interval is given.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Window length of [`LocalTracker::default`].
pub const DEFAULT_WINDOW_LENGTH: Duration = Duration::from_secs(60);

// Counters are kept until their window is this many window lengths old.
const RETENTION_WINDOWS: u64 = 3;

/// In-memory, single-process sliding-window tracker.
///
/// One coarse mutex guards every counter. Each public operation holds it for its
/// whole duration, including the opportunistic purge sweep, so a read-modify-write
/// on a counter is never split across acquisitions.
///
/// Stale counters are removed by traffic rather than a background task: whenever an
/// operation runs at or after the scheduled purge time, every counter whose window
/// started `3 x window_length` or more ago is dropped and the next sweep is scheduled
/// `purge_interval` later.
#[derive(Debug)]
pub struct LocalTracker {
    store: Mutex<CounterStore>,
    window_length: Duration,
    window_ms: u64,
    purge_interval: Duration,
    purge_ms: u64,
}

impl LocalTracker {
    /// Create a tracker with the default 5 minute purge interval.
    ///
    /// # Examples
    /// ```
    /// use sliding_throttle::rate_limit::LocalTracker;
    /// use std::time::Duration;
    /// let tracker = LocalTracker::new(Duration::from_secs(60)).unwrap();
    /// assert_eq!(tracker.tracked(), 0);
    /// ```
    pub fn new(window_length: Duration) -> Result<Self, ConfigError> {
        Self::with_purge_interval(window_length, DEFAULT_PURGE_INTERVAL)
    }

    /// Create a tracker with an explicit purge interval. Both durations must be >= 1ms.
    pub fn with_purge_interval(
        window_length: Duration,
        purge_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if duration_millis(window_length) == 0 {
            return Err(ConfigError::InvalidWindowLength(window_length));
        }
        if duration_millis(purge_interval) == 0 {
            return Err(ConfigError::InvalidPurgeInterval(purge_interval));
        }
        Ok(Self::from_parts(window_length, purge_interval))
    }

    // Callers have checked both durations are at least 1ms.
    fn from_parts(window_length: Duration, purge_interval: Duration) -> Self {
        Self {
            store: Mutex::new(CounterStore::new()),
            window_length,
            window_ms: duration_millis(window_length),
            purge_interval,
            purge_ms: duration_millis(purge_interval),
        }
    }

    /// Configured sweep interval.
    pub fn purge_interval(&self) -> Duration {
        self.purge_interval
    }

    /// Number of identifiers currently holding a counter.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// Rate for `id` at `now`. Never mutates a counter, but may run a purge sweep.
    pub fn rate_at(&self, id: u64, now: SystemTime) -> u64 {
        let now_ms = epoch_millis(now);
        let (scoped, previous, elapsed) = self.windows(now_ms);

        let mut store = self.lock();
        self.purge(&mut store, now_ms);

        let Some(c) = store.get(id).copied() else {
            return 0;
        };

        if c.window_start >= scoped {
            // A `now` behind the stored window sees that window from its start.
            let elapsed = if c.window_start == scoped { elapsed } else { 0 };
            self.sliding_rate(c.current, c.previous, elapsed)
        } else if Some(c.window_start) == previous {
            // Not rolled over yet; what is stored as current already belongs to the
            // previous window.
            self.sliding_rate(0, c.current, elapsed)
        } else {
            0
        }
    }

    /// Record one event for `id` at `now` and return the rate including it.
    pub fn record(&self, id: u64, now: SystemTime) -> u64 {
        let now_ms = epoch_millis(now);
        let (scoped, previous, elapsed) = self.windows(now_ms);

        let mut store = self.lock();
        self.purge(&mut store, now_ms);

        let Some(c) = store.get_mut(id) else {
            store.insert(id, Counter::first(scoped));
            return 1;
        };

        let mut elapsed = elapsed;
        if c.window_start >= scoped {
            // Late arrivals stamped before the stored window count into it; the
            // window never moves backwards.
            if c.window_start > scoped {
                elapsed = 0;
            }
            c.current = c.current.saturating_add(1);
        } else {
            c.previous = if Some(c.window_start) == previous { c.current } else { 0 };
            c.current = 1;
            c.window_start = scoped;
        }
        let (current, carried) = (c.current, c.previous);

        self.sliding_rate(current, carried, elapsed)
    }

    fn lock(&self) -> MutexGuard<'_, CounterStore> {
        // Counters are plain integers updated in place; a panic elsewhere cannot leave
        // one half-written, so a poisoned lock is still usable.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns (current window start, previous window start, elapsed into current).
    fn windows(&self, now_ms: u64) -> (u64, Option<u64>, u64) {
        let elapsed = now_ms % self.window_ms;
        let scoped = now_ms - elapsed;
        (scoped, scoped.checked_sub(self.window_ms), elapsed)
    }

    fn sliding_rate(&self, current: u64, previous: u64, elapsed_ms: u64) -> u64 {
        let remaining = self.window_ms.saturating_sub(elapsed_ms);
        let carried = u128::from(previous) * u128::from(remaining) / u128::from(self.window_ms);
        current.saturating_add(u64::try_from(carried).unwrap_or(u64::MAX))
    }

    fn purge(&self, store: &mut CounterStore, now_ms: u64) {
        if !store.purge_due(now_ms) {
            return;
        }
        let next = now_ms.saturating_add(self.purge_ms);
        match now_ms.checked_sub(self.window_ms.saturating_mul(RETENTION_WINDOWS)) {
            Some(cutoff) => {
                let removed = store.purge(cutoff, next);
                if removed > 0 {
                    tracing::trace!(removed, remaining = store.len(), "purged stale counters");
                }
            }
            // Nothing can be three windows old yet.
            None => store.reschedule(next),
        }
    }
}

impl Default for LocalTracker {
    /// 60 second window, 5 minute purge interval.
    fn default() -> Self {
        Self::from_parts(DEFAULT_WINDOW_LENGTH, DEFAULT_PURGE_INTERVAL)
    }
}

#[async_trait]
impl LimitTracker for LocalTracker {
    async fn get(&self, id: u64, now: SystemTime) -> Result<u64, TrackerError> {
        Ok(self.rate_at(id, now))
    }

    async fn increment(&self, id: u64, now: SystemTime) -> Result<u64, TrackerError> {
        Ok(self.record(id, now))
    }

    fn window_length(&self) -> Duration {
        self.window_length
    }
}
