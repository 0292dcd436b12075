//! keystash Test Utilities
//!
//! Centralized test infrastructure for the keystash workspace:
//! - Proptest generators for keys and payloads
//! - A backing store that records every call made to it
//! - Fixtures for opening a cache over a fresh store

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use keystash_storage::{
    BackingStore, ChangeListener, InMemoryBackingStore, SettingsCache, StoreChange,
};
use proptest::prelude::*;
use tokio::sync::broadcast;

// Re-export core types for convenience
pub use keystash_core::{CacheConfig, CacheStatistics, SettingValue, Value};

// ============================================================================
// RECORDING STORE
// ============================================================================

/// Backing store that counts the calls made to it.
///
/// Storage and notifications are delegated to an [`InMemoryBackingStore`].
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryBackingStore,
    fetches: AtomicU64,
    persists: AtomicU64,
    removes: AtomicU64,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn persists(&self) -> u64 {
        self.persists.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> u64 {
        self.removes.load(Ordering::SeqCst)
    }

    /// Write directly to the store, as another process would.
    pub fn external_persist(&self, key: &str, value: Value) {
        self.inner.persist(key, value);
    }

    /// Remove directly from the store, as another process would.
    pub fn external_remove(&self, key: &str) {
        self.inner.remove_key(key);
    }

    /// Read directly from the store without counting.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner.fetch(key)
    }
}

impl BackingStore for RecordingStore {
    fn fetch(&self, key: &str) -> Option<Value> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(key)
    }

    fn persist(&self, key: &str, value: Value) {
        self.persists.fetch_add(1, Ordering::SeqCst);
        self.inner.persist(key, value);
    }

    fn remove_key(&self, key: &str) {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_key(key);
    }

    fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A cache over a fresh [`RecordingStore`], with its listener.
pub struct RecordingFixture {
    pub store: Arc<RecordingStore>,
    pub cache: Arc<SettingsCache<RecordingStore>>,
    pub listener: ChangeListener<RecordingStore>,
}

impl RecordingFixture {
    pub fn new() -> Self {
        let store = Arc::new(RecordingStore::new());
        let (cache, listener) = SettingsCache::with_defaults(Arc::clone(&store));
        Self {
            store,
            cache,
            listener,
        }
    }
}

impl Default for RecordingFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `value` under `key` through the cache using the store's own persist.
pub fn write<S: BackingStore>(cache: &SettingsCache<S>, key: &str, value: Value) {
    cache.set_value(key, Some(value));
}

/// Read `key` through the cache using the store's own fetch.
pub fn read<S: BackingStore>(cache: &SettingsCache<S>, key: &str) -> Option<Value> {
    cache.object(key)
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Strategy for short settings keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.]{0,11}"
}

/// Strategy for payloads that compare equal to themselves.
///
/// Floats are finite so that `NaN` never breaks reflexivity.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        ".{0,16}".prop_map(Value::String),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9f64).prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        proptest::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        (0i64..4_000_000_000i64).prop_map(|secs| Value::Date(
            Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
        )),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for an optional payload, `None` standing for an absence.
pub fn optional_value_strategy() -> impl Strategy<Value = Option<Value>> {
    proptest::option::of(value_strategy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_store_counts_calls() {
        let fixture = RecordingFixture::new();
        write(&fixture.cache, "k", Value::from("v"));
        write(&fixture.cache, "k", Value::from("v"));
        assert_eq!(fixture.store.persists(), 1);

        assert_eq!(read(&fixture.cache, "k"), Some(Value::from("v")));
        assert_eq!(fixture.store.fetches(), 0);

        fixture.cache.remove_object("k");
        assert_eq!(fixture.store.removes(), 1);
        assert!(fixture.store.peek("k").is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: generated payloads are reflexively equal.
        #[test]
        fn prop_generated_values_are_reflexive(value in value_strategy()) {
            prop_assert_eq!(value.clone(), value);
        }
    }
}
