//! Deadline-ordered timers advanced by the caller's clock.
//!
//! Nothing here sleeps. The session schedules keys at absolute deadlines
//! and pops whatever is due each time it is ticked.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

/// One pending timer per key; rescheduling a key replaces its deadline
#[derive(Debug)]
pub struct Timers<K> {
    queue: BTreeMap<(Duration, u64), K>,
    index: HashMap<K, (Duration, u64)>,
    seq: u64,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            index: HashMap::new(),
            seq: 0,
        }
    }
}

impl<K: Clone + Eq + Hash> Timers<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: K, deadline: Duration) {
        self.cancel(&key);
        // seq keeps keys with equal deadlines in scheduling order
        let slot = (deadline, self.seq);
        self.seq += 1;
        self.queue.insert(slot, key.clone());
        self.index.insert(key, slot);
    }

    /// Returns true if the key was pending
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.queue.remove(&slot);
                true
            }
            None => false,
        }
    }

    pub fn deadline(&self, key: &K) -> Option<Duration> {
        self.index.get(key).map(|(deadline, _)| *deadline)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every key whose deadline is at or before `now`,
    /// earliest first
    pub fn pop_due(&mut self, now: Duration) -> Vec<K> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let key = entry.remove();
            self.index.remove(&key);
            due.push(key);
        }
        due
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
