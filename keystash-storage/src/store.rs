//! Backing store boundary and the in-memory reference store.
//!
//! The backing store is authoritative and durable. It exposes synchronous
//! get/set/remove by key and a broadcast stream of [`StoreChange`]
//! notifications that fires after every mutation, whoever issued it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use keystash_core::{CacheConfig, ConfigError, Value};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

/// Notification that the store's contents changed.
///
/// Carries no information about which key changed. The sequence number is
/// assigned by the store and only serves diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub sequence: u64,
}

/// A persistent key-value store the cache sits in front of.
///
/// Implementations must publish at least one [`StoreChange`] per mutation,
/// after the mutation is visible to `fetch`.
pub trait BackingStore: Send + Sync {
    /// Look up the value stored under `key`.
    fn fetch(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`.
    fn persist(&self, key: &str, value: Value);

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove_key(&self, key: &str);

    /// Whether the store holds a value for `key`.
    fn contains(&self, key: &str) -> bool {
        self.fetch(key).is_some()
    }

    /// Subscribe to change notifications issued after this call.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// In-memory backing store.
///
/// Direct calls to `persist` or `remove_key` behave like writes made by
/// another process: a cache in front of this store only learns about them
/// through the change stream.
#[derive(Debug)]
pub struct InMemoryBackingStore {
    data: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
    sequence: AtomicU64,
}

impl InMemoryBackingStore {
    /// Create a store whose change channel buffers `capacity` notifications.
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        CacheConfig::new()
            .with_notification_capacity(capacity)
            .validate()?;
        let (changes, _rx) = broadcast::channel(capacity);
        Ok(Self {
            data: RwLock::new(HashMap::new()),
            changes,
            sequence: AtomicU64::new(0),
        })
    }

    /// Create a store sized from a cache configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self, ConfigError> {
        Self::with_capacity(config.notification_capacity)
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Number of notifications published so far.
    pub fn change_count(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn notify(&self) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is fine; the change is still applied.
        let receivers = self.changes.send(StoreChange { sequence }).unwrap_or(0);
        trace!(sequence, receivers, "Published store change");
    }
}

impl Default for InMemoryBackingStore {
    fn default() -> Self {
        let (changes, _rx) = broadcast::channel(CacheConfig::default().notification_capacity);
        Self {
            data: RwLock::new(HashMap::new()),
            changes,
            sequence: AtomicU64::new(0),
        }
    }
}

impl BackingStore for InMemoryBackingStore {
    fn fetch(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    fn persist(&self, key: &str, value: Value) {
        self.data.write().insert(key.to_string(), value);
        self.notify();
    }

    fn remove_key(&self, key: &str) {
        self.data.write().remove(key);
        self.notify();
    }

    fn contains(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
