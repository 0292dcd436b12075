//! JSON-encoded structured values.
//!
//! Structured values are stored as [`Value::Bytes`] holding `serde_json`
//! output, so they deduplicate on their encoded form.

use keystash_core::{CodecError, StashResult, Value};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::facade::SettingsCache;
use crate::store::BackingStore;

impl<S: BackingStore> SettingsCache<S> {
    /// Read and decode the JSON value stored under `key`.
    ///
    /// Missing values, non-byte payloads and undecodable bytes all read as
    /// `None`. Decode failures are logged.
    pub fn json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.object(key)?;
        let bytes = value.as_bytes()?;
        match serde_json::from_slice(bytes) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                let err = CodecError::Decode {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!(key, error = %err, "Discarding undecodable JSON value");
                None
            }
        }
    }

    /// Encode `value` as JSON and write it through. `None` removes the key.
    pub fn set_json<T: Serialize>(&self, key: &str, value: Option<&T>) -> StashResult<()> {
        let Some(value) = value else {
            self.remove_object(key);
            return Ok(());
        };
        let bytes = serde_json::to_vec(value).map_err(|e| CodecError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.set_value(key, Some(Value::Bytes(bytes)));
        Ok(())
    }
}
