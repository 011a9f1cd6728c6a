//! Cache management module

mod client;
mod expiry;
mod instrumented;
mod key;
mod manager;
mod queue;
mod value;

pub use client::{CacheClient, CacheClientExt, PutOptions};
pub use expiry::{
    DEFAULT_TIME_TO_LIVE, Expiry, MAX_IDLE_HEADER, PERFORM_ASYNC_HEADER, TIME_TO_LIVE_HEADER,
};
pub use instrumented::InstrumentedCache;
pub use key::{CacheKey, KeySegment, NO_KEY_SENTINEL, hash_key};
pub use manager::CacheManager;
pub use queue::WorkQueue;
pub use value::CacheValue;
