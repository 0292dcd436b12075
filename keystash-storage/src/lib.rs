//! keystash Storage - Synchronized Settings Cache
//!
//! A concurrency-safe cache in front of a persistent key-value settings
//! store. Reads are served from memory when possible, redundant writes are
//! dropped before they reach the store, and changes made to the store by
//! anyone else invalidate the cache.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(InMemoryBackingStore::default());
//! let (cache, listener) = SettingsCache::open(store, CacheConfig::default())?;
//! let _listening = listener.spawn();
//!
//! cache.set("theme", "dark");
//! assert_eq!(cache.string("theme").as_deref(), Some("dark"));
//! ```

pub mod binding;
pub mod codec;
pub mod engine;
pub mod facade;
pub mod store;
pub mod typed;

pub use binding::{JsonSetting, Setting};
pub use engine::{CacheEngine, CacheLookup};
pub use facade::{ChangeListener, ChangeOrigin, DrainSummary, ListenerHandle, SettingsCache};
pub use store::{BackingStore, InMemoryBackingStore, StoreChange};

// Re-export core types for convenience
pub use keystash_core::{
    CacheConfig, CacheStatistics, CodecError, ConfigError, OpaqueValue, SettingValue, StashError,
    StashResult, Value,
};
