/// Time-related primitives: wall clock, debouncer and memoizer
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default quiet period for search input, in milliseconds.
pub const DEBOUNCE_DELAY_MS: f64 = 300.0;

/// Milliseconds since the Unix epoch.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Milliseconds since the Unix epoch.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Handle for one scheduled invocation. Only the most recent ticket can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket(u64);

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    due_at: f64,
    ticket: DebounceTicket,
}

/// Collapses bursts of values into the last one, released after a quiet period.
///
/// The debouncer owns a single pending slot. Scheduling replaces the slot
/// (cancelling the previous invocation), so at most one invocation is pending.
/// It does not own a timer: the host either polls it with the current time or
/// sleeps for [`Debouncer::delay_ms`] and then calls [`Debouncer::fire`] with
/// the ticket it was given. A stale ticket never fires.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay_ms: f64,
    next_ticket: u64,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: f64) -> Self {
        Debouncer {
            delay_ms,
            next_ticket: 0,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn set_delay_ms(&mut self, delay_ms: f64) {
        self.delay_ms = delay_ms;
    }

    /// Schedule `value`, cancelling whatever was pending.
    pub fn schedule(&mut self, value: T, now: f64) -> DebounceTicket {
        self.next_ticket += 1;
        let ticket = DebounceTicket(self.next_ticket);
        if self.pending.is_some() {
            log::debug!("Debouncer: rescheduling, previous invocation cancelled");
        }
        self.pending = Some(Pending {
            value,
            due_at: now + self.delay_ms,
            ticket,
        });
        ticket
    }

    /// Release the pending value if `ticket` is still the current one.
    pub fn fire(&mut self, ticket: DebounceTicket) -> Option<T> {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Release the pending value if its quiet period has elapsed at `now`.
    pub fn poll(&mut self, now: f64) -> Option<T> {
        match &self.pending {
            Some(pending) if now >= pending.due_at => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Drop the pending invocation. Returns true if something was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// A bounded key → result cache.
///
/// Keys are produced by the caller from its inputs; the memoizer never looks
/// at the inputs themselves. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct Memoizer<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> Memoizer<K, V> {
    pub fn new(capacity: usize) -> Self {
        Memoizer {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached value for `key`, computing and caching it on a miss.
    pub fn get_or_compute<F>(&mut self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            return value.clone();
        }

        self.misses += 1;
        let value = compute();

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value.clone());
        value
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
