//! Bindings of a single key to a typed value with a default.
//!
//! A [`Setting`] is a small handle holding a key, a default and the cache it
//! reads through. Cloning it is cheap and every clone sees the same value.

use std::sync::Arc;

use keystash_core::{SettingValue, StashResult};
use serde::{de::DeserializeOwned, Serialize};

use crate::facade::SettingsCache;
use crate::store::BackingStore;

/// A key bound to a typed value with a fallback default.
pub struct Setting<T, S: BackingStore> {
    key: String,
    default: T,
    cache: Arc<SettingsCache<S>>,
}

impl<T, S> Setting<T, S>
where
    T: SettingValue + Clone,
    S: BackingStore,
{
    pub fn new(cache: Arc<SettingsCache<S>>, key: impl Into<String>, default: T) -> Self {
        Self {
            key: key.into(),
            default,
            cache,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The stored value, or the default when missing or of another kind.
    pub fn get(&self) -> T {
        self.cache
            .get(&self.key)
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn set(&self, value: T) {
        self.cache.set_value(&self.key, Some(value.into_value()));
    }

    /// Remove the stored value so reads fall back to the default.
    pub fn reset(&self) {
        self.cache.remove_object(&self.key);
    }
}

impl<T: Clone, S: BackingStore> Clone for Setting<T, S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            default: self.default.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

/// A key bound to a JSON-encoded value with a fallback default.
pub struct JsonSetting<T, S: BackingStore> {
    key: String,
    default: T,
    cache: Arc<SettingsCache<S>>,
}

impl<T, S> JsonSetting<T, S>
where
    T: Serialize + DeserializeOwned + Clone,
    S: BackingStore,
{
    pub fn new(cache: Arc<SettingsCache<S>>, key: impl Into<String>, default: T) -> Self {
        Self {
            key: key.into(),
            default,
            cache,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> T {
        self.cache
            .json(&self.key)
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn set(&self, value: &T) -> StashResult<()> {
        self.cache.set_json(&self.key, Some(value))
    }

    pub fn reset(&self) {
        self.cache.remove_object(&self.key);
    }
}
