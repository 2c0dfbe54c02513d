//! Bounded, insertion-ordered row cache with optional expiry.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

use crate::Row;

#[derive(Debug, Clone)]
struct Entry {
    row: Row,
    inserted_at: Instant,
}

/// Rows keyed by the textual value of the table's cache key column.
///
/// Entries are kept in insertion order, so the front of the map is always
/// the oldest entry: expiry purges from the front, and when the cache is
/// full the front entry is evicted. Re-inserting a key moves it to the back.
#[derive(Debug)]
pub struct TtlCache {
    entries: IndexMap<String, Entry>,
    ttl: Option<Duration>,
    max_size: usize,
}

impl TtlCache {
    /// A cache holding at most `max_size` rows. `ttl: None` never expires.
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        TtlCache {
            entries: IndexMap::new(),
            ttl,
            max_size,
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.inserted_at) >= ttl)
    }

    /// The cached row for `key`, unless it has expired.
    pub fn get(&mut self, key: &str) -> Option<Row> {
        let now = Instant::now();
        let expired = self.is_expired(self.entries.get(key)?, now);
        if expired {
            self.entries.shift_remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.row.clone())
    }

    /// Store `row` under `key`, replacing and refreshing any existing entry.
    pub fn insert(&mut self, key: String, row: Row) {
        let now = Instant::now();
        self.entries.shift_remove(&key);
        self.entries.insert(
            key,
            Entry {
                row,
                inserted_at: now,
            },
        );
        self.purge_expired(now);
        while self.entries.len() > self.max_size {
            self.entries.shift_remove_index(0);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Row> {
        self.entries.shift_remove(key).map(|e| e.row)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&mut self, now: Instant) {
        while let Some((_, entry)) = self.entries.first() {
            if !self.is_expired(entry, now) {
                break;
            }
            self.entries.shift_remove_index(0);
        }
    }
}
