//! cachewire core
//!
//! This crate provides the cache manager: key derivation, round-robin
//! server selection, fail-open reads, queued background writes and the
//! configuration surface that feeds them.

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;

pub use cache::{
    CacheClient, CacheClientExt, CacheKey, CacheManager, CacheValue, Expiry, InstrumentedCache,
    PutOptions,
};
pub use config::{CacheSettings, ConfigSource, DEFAULT_SECTION, transport_settings_from};
pub use endpoint::{Endpoint, ServerPool};
pub use error::{ConfigError, CoreError, PoolError};
