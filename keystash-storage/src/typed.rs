//! Typed accessors over the read-through/write-through paths.
//!
//! Each getter reads the raw [`Value`] through the cache and converts it.
//! A payload of the wrong kind reads like a missing value: `None`, or the
//! type's default for `integer`, `double` and `bool`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keystash_core::{SettingValue, Value};
use url::Url;

use crate::facade::SettingsCache;
use crate::store::BackingStore;

impl<S: BackingStore> SettingsCache<S> {
    /// Read the raw value stored under `key`.
    pub fn object(&self, key: &str) -> Option<Value> {
        self.read_through(key, |store| store.fetch(key))
    }

    /// Read `key` as `T`. `None` when missing or of another kind.
    pub fn get<T: SettingValue>(&self, key: &str) -> Option<T> {
        self.object(key).and_then(|value| T::from_value(&value))
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key)
    }

    pub fn integer(&self, key: &str) -> i64 {
        self.get(key).unwrap_or(0)
    }

    pub fn double(&self, key: &str) -> f64 {
        self.get(key).unwrap_or(0.0)
    }

    pub fn float(&self, key: &str) -> f32 {
        self.get(key).unwrap_or(0.0)
    }

    pub fn bool(&self, key: &str) -> bool {
        self.get(key).unwrap_or(false)
    }

    pub fn data(&self, key: &str) -> Option<Vec<u8>> {
        self.get(key)
    }

    pub fn url(&self, key: &str) -> Option<Url> {
        self.get(key)
    }

    pub fn date(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key)
    }

    pub fn array(&self, key: &str) -> Option<Vec<Value>> {
        self.get(key)
    }

    pub fn dictionary(&self, key: &str) -> Option<BTreeMap<String, Value>> {
        self.get(key)
    }

    /// Write `value` under `key`, persisting only if it changed.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.set_value(key, Some(value.into()));
    }

    /// Write `value`, or an absence for `None`, persisting only on change.
    pub fn set_optional<T: Into<Value>>(&self, key: &str, value: Option<T>) {
        self.set_value(key, value.map(Into::into));
    }

    /// Write a raw value or absence.
    ///
    /// An absence is persisted as a removal; the store never receives a
    /// `None` payload.
    pub fn set_value(&self, key: &str, value: Option<Value>) {
        let persisted = value.clone();
        self.write_through(key, value, move |store| match persisted {
            Some(value) => store.persist(key, value),
            None => store.remove_key(key),
        });
    }
}
