//! Read-through/write-through facade with change reconciliation.
//!
//! [`SettingsCache`] routes reads and writes through a [`CacheEngine`] and
//! touches the backing store only on a cache miss or an actual change.
//!
//! # Reconciliation
//!
//! The backing store notifies on every mutation, including the ones this
//! cache issues itself. To avoid throwing the cache away after its own
//! writes, the facade counts the writes it has issued but not yet seen
//! echoed back:
//!
//! ```text
//! write_through / remove_object      pending += 1, then persist
//! notification, pending > 0          pending -= 1  (own write, keep cache)
//! notification, pending == 0         external change, invalidate all
//! ```
//!
//! This matches counts, not identities. It assumes notifications arrive in
//! write order, exactly one per write. Stores that coalesce notifications
//! break that assumption and leave the counter elevated, which can hide a
//! later external change.
//!
//! A read-through miss that races with a write from this same cache can
//! store the value fetched before the write landed. The write's
//! notification is then attributed to the write and nothing invalidates
//! the stale entry. Only notifications from other writers are guaranteed
//! to clear the cache.
//!
//! Reconciliation happens only while the [`ChangeListener`] is driven. A
//! listener that is dropped or never run leaves external changes unseen
//! and the pending-write counter growing.

use std::sync::{Arc, Weak};

use keystash_core::{CacheConfig, CacheStatistics, StashResult, Value};
use parking_lot::Mutex;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::engine::{CacheEngine, CacheLookup};
use crate::store::{BackingStore, StoreChange};

/// How a change notification was attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Accounted for by a write this cache issued.
    SelfIssued,
    /// Not caused by this cache.
    External,
}

/// Synchronized cache in front of a [`BackingStore`].
///
/// There is no global instance. Construct one per store with
/// [`SettingsCache::open`] and pass the `Arc` to whoever needs it.
/// Instances never share state, even over the same store.
pub struct SettingsCache<S: BackingStore> {
    store: Arc<S>,
    engine: CacheEngine,
    /// Self-issued writes not yet matched by a notification.
    pending_writes: Mutex<u64>,
    config: CacheConfig,
}

impl<S: BackingStore> SettingsCache<S> {
    /// Create a cache over `store` together with its change listener.
    ///
    /// The listener is subscribed before this returns, so every write issued
    /// through the cache afterwards produces a notification it will see. The
    /// caller must drive the listener, either with [`ChangeListener::drain`]
    /// or by spawning it. An undriven listener turns reconciliation off:
    /// external changes never invalidate the cache.
    #[must_use = "the change listener must be driven or external changes are never seen"]
    pub fn open(store: Arc<S>, config: CacheConfig) -> StashResult<(Arc<Self>, ChangeListener<S>)> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    /// Create a cache with the default configuration.
    #[must_use = "the change listener must be driven or external changes are never seen"]
    pub fn with_defaults(store: Arc<S>) -> (Arc<Self>, ChangeListener<S>) {
        Self::build(store, CacheConfig::default())
    }

    fn build(store: Arc<S>, config: CacheConfig) -> (Arc<Self>, ChangeListener<S>) {
        let changes = store.subscribe();
        let cache = Arc::new(Self {
            store,
            engine: CacheEngine::new(),
            pending_writes: Mutex::new(0),
            config,
        });
        let listener = ChangeListener {
            changes,
            cache: Arc::downgrade(&cache),
        };
        (cache, listener)
    }

    /// Get a reference to the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read `key` from the cache, falling back to `fetch` on a miss.
    ///
    /// The fetched value, or its absence, is cached before returning. `fetch`
    /// runs without any cache lock held.
    pub fn read_through<F>(&self, key: &str, fetch: F) -> Option<Value>
    where
        F: FnOnce(&S) -> Option<Value>,
    {
        if let CacheLookup::Hit(value) = self.engine.get(key) {
            return value;
        }
        let value = fetch(&self.store);
        debug!(key, found = value.is_some(), "Cache miss, read through to store");
        self.engine.set(value.clone(), key);
        value
    }

    /// Write `value` to the cache and, if it changed, run `persist`.
    ///
    /// The pending-write counter is raised before `persist` runs, so the
    /// notification the write triggers is always attributed to it.
    pub fn write_through<F>(&self, key: &str, value: Option<Value>, persist: F)
    where
        F: FnOnce(&S),
    {
        if !self.engine.set(value, key) {
            debug!(key, "Value unchanged, skipping persistence");
            return;
        }
        *self.pending_writes.lock() += 1;
        persist(&self.store);
    }

    /// Remove `key` from the backing store and cache its absence.
    ///
    /// Always reaches the store, whether or not the key was cached.
    pub fn remove_object(&self, key: &str) {
        *self.pending_writes.lock() += 1;
        self.engine.remove(key);
        self.store.remove_key(key);
    }

    /// Whether the backing store holds a value for `key`. Never cached.
    pub fn has_value(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Attribute one change notification.
    ///
    /// Consumes one pending write if there is one. Otherwise the change came
    /// from elsewhere and the whole cache is invalidated.
    pub fn handle_change(&self) -> ChangeOrigin {
        let origin = {
            let mut pending = self.pending_writes.lock();
            if *pending > 0 {
                *pending -= 1;
                ChangeOrigin::SelfIssued
            } else {
                ChangeOrigin::External
            }
        };

        match origin {
            ChangeOrigin::SelfIssued => debug!("Change accounted for by own write"),
            ChangeOrigin::External if self.config.reconcile_external_changes => {
                info!("External change detected, invalidating cache");
                self.engine.invalidate_all();
            }
            ChangeOrigin::External => {
                debug!("External change ignored, reconciliation disabled");
            }
        }
        origin
    }

    /// Account for `skipped` notifications lost from the change stream.
    fn handle_lag(&self, skipped: u64) {
        let consumed = {
            let mut pending = self.pending_writes.lock();
            let consumed = (*pending).min(skipped);
            *pending -= consumed;
            consumed
        };
        warn!(skipped, consumed, "Change notifications dropped");
        if self.config.invalidate_on_lag {
            self.engine.invalidate_all();
        }
    }

    /// Self-issued writes not yet matched by a notification.
    pub fn pending_writes(&self) -> u64 {
        *self.pending_writes.lock()
    }

    /// Invalidate every cached key.
    pub fn invalidate_cache(&self) {
        self.engine.invalidate_all();
    }

    /// Invalidate a single cached key.
    pub fn invalidate_key(&self, key: &str) {
        self.engine.invalidate(key);
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.engine.statistics()
    }

    pub fn reset_statistics(&self) {
        self.engine.reset_statistics();
    }
}

// ============================================================================
// CHANGE LISTENER
// ============================================================================

/// Outcome of draining queued change notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub self_issued: usize,
    pub external: usize,
    /// Notifications lost because the channel overflowed.
    pub lagged: u64,
}

impl DrainSummary {
    pub fn handled(&self) -> usize {
        self.self_issued + self.external
    }
}

/// Consumer of a store's change stream on behalf of one [`SettingsCache`].
///
/// Holds only a weak reference to the cache; once the cache is dropped the
/// listener stops.
#[must_use = "a listener that is never drained or spawned leaves the cache stale"]
pub struct ChangeListener<S: BackingStore> {
    changes: broadcast::Receiver<StoreChange>,
    cache: Weak<SettingsCache<S>>,
}

impl<S: BackingStore> ChangeListener<S> {
    /// Process every notification queued so far without waiting.
    pub fn drain(&mut self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        loop {
            let Some(cache) = self.cache.upgrade() else {
                break;
            };
            match self.changes.try_recv() {
                Ok(change) => {
                    trace!(sequence = change.sequence, "Store change received");
                    match cache.handle_change() {
                        ChangeOrigin::SelfIssued => summary.self_issued += 1,
                        ChangeOrigin::External => summary.external += 1,
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    cache.handle_lag(skipped);
                    summary.lagged += skipped;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        summary
    }

    /// Process notifications until the store or the cache goes away.
    pub async fn run(mut self) {
        loop {
            let result = self.changes.recv().await;
            let Some(cache) = self.cache.upgrade() else {
                debug!("Cache dropped, stopping change listener");
                break;
            };
            match result {
                Ok(change) => {
                    trace!(sequence = change.sequence, "Store change received");
                    cache.handle_change();
                }
                Err(RecvError::Lagged(skipped)) => cache.handle_lag(skipped),
                Err(RecvError::Closed) => {
                    debug!("Change stream closed, stopping change listener");
                    break;
                }
            }
        }
    }
}

impl<S: BackingStore + 'static> ChangeListener<S> {
    /// Run the listener on the current tokio runtime.
    pub fn spawn(self) -> ListenerHandle {
        ListenerHandle {
            task: tokio::spawn(self.run()),
        }
    }
}

/// Handle to a spawned listener. Dropping it stops the listener.
#[derive(Debug)]
#[must_use = "dropping the handle stops the listener"]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
