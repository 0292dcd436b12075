//! Cache access statistics.

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of cache accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    /// Reads answered from memory, including cached absences.
    pub hits: u64,
    /// Reads for keys that were never looked up or have been invalidated.
    pub misses: u64,
    /// Writes dropped because the cached value was already equal.
    pub skipped_writes: u64,
}

impl CacheStatistics {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of reads accounted for.
    pub fn reads(&self) -> u64 {
        self.hits + self.misses
    }
}
