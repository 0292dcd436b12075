//! Configuration types

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration for a settings cache and its change stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Buffer size of the change notification channel for in-memory stores.
    pub notification_capacity: usize,
    /// Invalidate the whole cache when change notifications were dropped.
    pub invalidate_on_lag: bool,
    /// Invalidate the whole cache on notifications not caused by this cache.
    /// Only disable for stores that have no other writer.
    pub reconcile_external_changes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            notification_capacity: 1024,
            invalidate_on_lag: true,
            reconcile_external_changes: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the change notification buffer size.
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Enable or disable invalidation on dropped notifications.
    pub fn with_invalidate_on_lag(mut self, enabled: bool) -> Self {
        self.invalidate_on_lag = enabled;
        self
    }

    /// Enable or disable invalidation on external changes.
    pub fn with_reconcile_external_changes(mut self, enabled: bool) -> Self {
        self.reconcile_external_changes = enabled;
        self
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notification_capacity".to_string(),
                value: self.notification_capacity.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
