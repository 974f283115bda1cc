//! Bounded "observed but unhandled" tables (§4.2)
//!
//! Tracks unmapped instances and unknown PGNs seen on the bus, each
//! with first-seen/last-seen/count and one captured sample payload.
//! Bounded so a noisy bus can't grow these without limit; once full,
//! the least-recently-first-seen entry is evicted to make room.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::Hash;
use std::time::Instant;

/// One observed-but-unhandled entry.
#[derive(Clone, Debug)]
pub struct ObservedEntry {
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub occurrence_count: u64,
    pub sample_payload: Vec<u8>,
}

/// Bounded, insertion-ordered table of observed-but-unhandled keys.
pub struct ObservedTable<K: Eq + Hash + Clone> {
    capacity: usize,
    entries: RwLock<HashMap<K, ObservedEntry>>,
    order: RwLock<VecDeque<K>>,
}

impl<K: Eq + Hash + Clone> ObservedTable<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(HashMap::new()),
            order: RwLock::new(VecDeque::new()),
        }
    }

    /// Record one more occurrence of `key`, capturing `payload` as the
    /// sample only on first observation.
    pub fn record(&self, key: K, payload: &[u8]) {
        let now = Instant::now();
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_seen = now;
            entry.occurrence_count += 1;
            return;
        }

        if entries.len() >= self.capacity {
            let mut order = self.order.write();
            if let Some(oldest) = order.pop_front() {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key.clone(),
            ObservedEntry {
                first_seen: now,
                last_seen: now,
                occurrence_count: 1,
                sample_payload: payload.to_vec(),
            },
        );
        self.order.write().push_back(key);
    }

    pub fn snapshot(&self) -> HashMap<K, ObservedEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for ObservedTable<K> {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_first_seen_and_counts() {
        let table: ObservedTable<u32> = ObservedTable::new(4);
        table.record(1, &[1, 2, 3]);
        table.record(1, &[4, 5, 6]);

        let snapshot = table.snapshot();
        let entry = snapshot.get(&1).unwrap();
        assert_eq!(entry.occurrence_count, 2);
        // sample payload is the first observed, not overwritten
        assert_eq!(entry.sample_payload, vec![1, 2, 3]);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let table: ObservedTable<u32> = ObservedTable::new(2);
        table.record(1, &[]);
        table.record(2, &[]);
        table.record(3, &[]);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains_key(&1));
        assert!(snapshot.contains_key(&3));
    }
}
