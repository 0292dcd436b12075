//! keystash Core - Payload and Accounting Types
//!
//! Pure data structures shared by the cache engine and its storage
//! integrations: the [`Value`] payload union, [`CacheStatistics`],
//! [`CacheConfig`] and the error taxonomy.

pub mod config;
pub mod error;
pub mod stats;
pub mod value;

pub use config::CacheConfig;
pub use error::{CodecError, ConfigError, StashError, StashResult};
pub use stats::CacheStatistics;
pub use value::{OpaqueValue, SettingValue, Value};
