//! In-memory cache engine with negative caching and write deduplication.
//!
//! The engine knows nothing about the backing store. A key missing from the
//! map means it was never looked up; a key mapped to an absent entry means
//! the store confirmed there is no value. Callers use a [`CacheLookup::Miss`]
//! as their signal to read through to the store.
//!
//! # Thread Safety
//!
//! The map and the counters live behind separate `parking_lot` mutexes.
//! When both are held the map lock is always taken first. No I/O happens
//! while either lock is held.

use std::collections::HashMap;

use keystash_core::{CacheStatistics, Value};
use parking_lot::Mutex;

/// A cached entry: a concrete value or a confirmed absence.
#[derive(Debug, Clone, PartialEq)]
enum CacheEntry {
    Present(Value),
    Absent,
}

impl CacheEntry {
    fn from_option(value: Option<Value>) -> Self {
        match value {
            Some(value) => CacheEntry::Present(value),
            None => CacheEntry::Absent,
        }
    }

    fn to_option(&self) -> Option<Value> {
        match self {
            CacheEntry::Present(value) => Some(value.clone()),
            CacheEntry::Absent => None,
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// The key is cached. `None` is a cached absence.
    Hit(Option<Value>),
    /// The key was never looked up or has been invalidated.
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    /// The cached value, `None` for both misses and cached absences.
    pub fn into_value(self) -> Option<Value> {
        match self {
            CacheLookup::Hit(value) => value,
            CacheLookup::Miss => None,
        }
    }
}

/// Thread-safe memoization of key to value-or-absence.
#[derive(Debug, Default)]
pub struct CacheEngine {
    entries: Mutex<HashMap<String, CacheEntry>>,
    stats: Mutex<CacheStatistics>,
}

impl CacheEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key, counting a hit or a miss.
    pub fn get(&self, key: &str) -> CacheLookup {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) => {
                self.stats.lock().hits += 1;
                CacheLookup::Hit(entry.to_option())
            }
            None => {
                self.stats.lock().misses += 1;
                CacheLookup::Miss
            }
        }
    }

    /// Store a value or an absence under `key`.
    ///
    /// Returns `false` and counts a skipped write when the cached entry is
    /// already equal, meaning nothing needs to be persisted. Returns `true`
    /// when the entry changed.
    pub fn set(&self, value: Option<Value>, key: &str) -> bool {
        let entry = CacheEntry::from_option(value);
        let mut entries = self.entries.lock();
        if entries.get(key) == Some(&entry) {
            self.stats.lock().skipped_writes += 1;
            return false;
        }
        entries.insert(key.to_string(), entry);
        true
    }

    /// Record that `key` has no value. A later `get` is a hit returning `None`.
    pub fn remove(&self, key: &str) {
        self.entries.lock().insert(key.to_string(), CacheEntry::Absent);
    }

    /// Forget `key` entirely. A later `get` is a miss.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Forget every key.
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    /// Number of keys currently cached, including cached absences.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn statistics(&self) -> CacheStatistics {
        *self.stats.lock()
    }

    pub fn reset_statistics(&self) {
        *self.stats.lock() = CacheStatistics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn s(v: &str) -> Option<Value> {
        Some(Value::from(v))
    }

    #[test]
    fn test_unknown_key_is_miss() {
        let engine = CacheEngine::new();
        assert_eq!(engine.get("k"), CacheLookup::Miss);
        assert_eq!(engine.get("k"), CacheLookup::Miss);
        let stats = engine.statistics();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_set_dedup_sequence() {
        let engine = CacheEngine::new();

        assert!(engine.set(s("v1"), "k"));
        assert!(!engine.set(s("v1"), "k"));
        assert_eq!(engine.statistics().skipped_writes, 1);

        assert!(engine.set(s("v2"), "k"));
        assert_eq!(engine.statistics().skipped_writes, 1);

        assert_eq!(engine.get("k"), CacheLookup::Hit(s("v2")));
        assert_eq!(engine.statistics().hits, 1);
    }

    #[test]
    fn test_absent_equals_absent() {
        let engine = CacheEngine::new();
        assert!(engine.set(None, "k"));
        assert!(!engine.set(None, "k"));
        assert_eq!(engine.statistics().skipped_writes, 1);
        assert_eq!(engine.get("k"), CacheLookup::Hit(None));
    }

    #[test]
    fn test_cross_kind_write_is_not_skipped() {
        let engine = CacheEngine::new();
        assert!(engine.set(Some(Value::Integer(1)), "k"));
        assert!(engine.set(Some(Value::Float(1.0)), "k"));
        assert!(engine.set(Some(Value::Bool(true)), "k"));
        assert_eq!(engine.statistics().skipped_writes, 0);
    }

    #[test]
    fn test_incomparable_write_is_never_skipped() {
        #[derive(Debug)]
        struct Socket;

        let engine = CacheEngine::new();
        let value = Value::incomparable(Socket);
        assert!(engine.set(Some(value.clone()), "k"));
        assert!(engine.set(Some(value), "k"));
        assert_eq!(engine.statistics().skipped_writes, 0);
    }

    #[test]
    fn test_remove_caches_absence() {
        let engine = CacheEngine::new();
        engine.set(s("v"), "k");
        engine.remove("k");
        let lookup = engine.get("k");
        assert!(lookup.is_hit());
        assert_eq!(lookup.into_value(), None);
    }

    #[test]
    fn test_remove_unknown_key_caches_absence() {
        let engine = CacheEngine::new();
        engine.remove("never-seen");
        assert_eq!(engine.get("never-seen"), CacheLookup::Hit(None));
    }

    #[test]
    fn test_invalidate_forces_miss() {
        let engine = CacheEngine::new();
        engine.set(s("v"), "k");
        engine.set(s("other"), "k2");
        engine.invalidate("k");
        assert_eq!(engine.get("k"), CacheLookup::Miss);
        assert_eq!(engine.get("k2"), CacheLookup::Hit(s("other")));
    }

    #[test]
    fn test_invalidate_all_forces_miss_everywhere() {
        let engine = CacheEngine::new();
        for i in 0..10 {
            engine.set(Some(Value::Integer(i)), &format!("k{i}"));
        }
        engine.remove("gone");
        assert_eq!(engine.len(), 11);

        engine.invalidate_all();
        assert!(engine.is_empty());
        for i in 0..10 {
            assert_eq!(engine.get(&format!("k{i}")), CacheLookup::Miss);
        }
        assert_eq!(engine.get("gone"), CacheLookup::Miss);
    }

    #[test]
    fn test_reset_statistics_keeps_entries() {
        let engine = CacheEngine::new();
        engine.set(s("v"), "k");
        engine.set(s("v"), "k");
        engine.get("k");
        engine.get("missing");

        engine.reset_statistics();
        let stats = engine.statistics();
        assert_eq!(stats, CacheStatistics::default());
        assert_eq!(stats.hit_rate(), 0.0);

        // Entries survive a statistics reset
        assert_eq!(engine.get("k"), CacheLookup::Hit(s("v")));
    }

    #[test]
    fn test_set_then_get_same_thread() {
        let engine = CacheEngine::new();
        for i in 0..100 {
            engine.set(Some(Value::Integer(i)), "k");
            assert_eq!(engine.get("k"), CacheLookup::Hit(Some(Value::Integer(i))));
        }
    }

    #[test]
    fn test_concurrent_writers_last_value_is_one_of_written() {
        const THREADS: i64 = 8;
        const ITERATIONS: i64 = 500;

        let engine = Arc::new(CacheEngine::new());
        let barrier = Arc::new(Barrier::new(THREADS as usize));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut last = 0;
                    for i in 0..ITERATIONS {
                        last = t * ITERATIONS + i;
                        engine.set(Some(Value::Integer(last)), "shared");
                    }
                    last
                })
            })
            .collect();

        let finals: Vec<i64> = handles
            .into_iter()
            .map(|h| h.join().expect("writer thread panicked"))
            .collect();

        // The surviving value must be the final write of some thread
        match engine.get("shared") {
            CacheLookup::Hit(Some(Value::Integer(n))) => assert!(finals.contains(&n)),
            other => panic!("unexpected lookup: {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_reads_are_all_counted() {
        const THREADS: usize = 8;
        const READS: u64 = 1_000;

        let engine = Arc::new(CacheEngine::new());
        engine.set(s("v"), "hot");

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..READS {
                        if (i + t as u64) % 2 == 0 {
                            engine.get("hot");
                        } else {
                            engine.get("cold");
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("reader thread panicked");
        }

        let stats = engine.statistics();
        assert_eq!(stats.hits + stats.misses, THREADS as u64 * READS);
    }
}
