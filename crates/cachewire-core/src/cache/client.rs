//! Cache capability traits

use async_trait::async_trait;
use cachewire_transport::{JsonCodec, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::expiry::Expiry;
use super::key::CacheKey;
use super::value::CacheValue;
use crate::error::CoreError;

/// How a computed value is persisted by [`CacheClientExt::get_or_put`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub expiry: Expiry,
    /// Await the write instead of queueing it
    pub wait: bool,
}

impl PutOptions {
    pub fn new(expiry: Expiry) -> Self {
        Self {
            expiry,
            wait: false,
        }
    }

    pub fn wait(mut self) -> Self {
        self.wait = true;
        self
    }
}

/// String-level cache operations.
///
/// Reads and fire-and-forget writes never fail: errors become an empty
/// string or are logged and dropped. The `*_and_wait` variants report
/// transport failures to the caller.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Codec used for typed values
    fn codec(&self) -> &JsonCodec;

    /// Cached text, or an empty string on miss, timeout or error
    async fn get(&self, key: &CacheKey) -> String;

    /// Queue a write; the caller does not wait. Returns false when the
    /// write was dropped before being queued.
    fn put(&self, key: &CacheKey, value: CacheValue, expiry: Expiry) -> bool;

    /// Write and return the server's response, successful or not
    async fn put_and_wait(
        &self,
        key: &CacheKey,
        value: CacheValue,
        expiry: Expiry,
        perform_async: bool,
    ) -> Result<Response, CoreError>;

    /// Queue a delete; false when it was dropped
    fn delete(&self, key: &CacheKey) -> bool;

    async fn delete_and_wait(
        &self,
        key: &CacheKey,
        perform_async: bool,
    ) -> Result<Response, CoreError>;
}

#[async_trait]
impl<C: CacheClient + ?Sized> CacheClient for Arc<C> {
    fn codec(&self) -> &JsonCodec {
        (**self).codec()
    }

    async fn get(&self, key: &CacheKey) -> String {
        (**self).get(key).await
    }

    fn put(&self, key: &CacheKey, value: CacheValue, expiry: Expiry) -> bool {
        (**self).put(key, value, expiry)
    }

    async fn put_and_wait(
        &self,
        key: &CacheKey,
        value: CacheValue,
        expiry: Expiry,
        perform_async: bool,
    ) -> Result<Response, CoreError> {
        (**self).put_and_wait(key, value, expiry, perform_async).await
    }

    fn delete(&self, key: &CacheKey) -> bool {
        (**self).delete(key)
    }

    async fn delete_and_wait(
        &self,
        key: &CacheKey,
        perform_async: bool,
    ) -> Result<Response, CoreError> {
        (**self).delete_and_wait(key, perform_async).await
    }
}

/// Typed operations layered over any [`CacheClient`]
#[async_trait]
pub trait CacheClientExt: CacheClient {
    /// Cached value decoded as `V`; undecodable text is a miss.
    ///
    /// Values that serialize to a JSON string are stored without quotes, so
    /// text that is not valid JSON for `V` is retried as a JSON string.
    async fn get_as<V>(&self, key: &CacheKey) -> Option<V>
    where
        V: DeserializeOwned + Send,
    {
        let text = self.get(key).await;
        if text.is_empty() {
            return None;
        }

        let decoded = match self.codec().decode(&text) {
            Ok(value) => return Some(value),
            Err(e) => e,
        };

        match serde_json::from_value(Value::String(text)) {
            Ok(value) => Some(value),
            Err(_) => {
                debug!("Discarding undecodable cache entry {}: {}", key, decoded);
                None
            }
        }
    }

    /// Queue a write of any serializable value
    fn put_value<V>(&self, key: &CacheKey, value: &V, expiry: Expiry) -> bool
    where
        V: Serialize + ?Sized,
    {
        match CacheValue::from_serialize(self.codec(), value) {
            Ok(value) => self.put(key, value, expiry),
            Err(e) => {
                debug!("Skipping cache write for {}: {}", key, e);
                false
            }
        }
    }

    /// Cached value, or the factory's value which is then written back.
    ///
    /// The factory runs only on a miss. Concurrent misses on the same key
    /// each run their own factory.
    async fn get_or_put<V, F, Fut>(&self, key: &CacheKey, options: PutOptions, factory: F) -> Option<V>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Option<V>> + Send,
    {
        if let Some(cached) = self.get_as::<V>(key).await {
            return Some(cached);
        }

        let fresh = factory().await?;
        match CacheValue::from_serialize(self.codec(), &fresh) {
            Ok(value) => persist(self, key, value, options).await,
            Err(e) => debug!("Skipping cache write for {}: {}", key, e),
        }
        Some(fresh)
    }

    /// Text flavour of [`CacheClientExt::get_or_put`]; any non-empty cached
    /// string is a hit
    async fn get_or_put_text<F, Fut>(
        &self,
        key: &CacheKey,
        options: PutOptions,
        factory: F,
    ) -> Option<String>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Option<String>> + Send,
    {
        let cached = self.get(key).await;
        if !cached.is_empty() {
            return Some(cached);
        }

        let fresh = factory().await?;
        persist(self, key, CacheValue::Text(fresh.clone()), options).await;
        Some(fresh)
    }
}

impl<C: CacheClient + ?Sized> CacheClientExt for C {}

async fn persist<C>(client: &C, key: &CacheKey, value: CacheValue, options: PutOptions)
where
    C: CacheClient + ?Sized,
{
    if !options.wait {
        if !client.put(key, value, options.expiry) {
            debug!("Cache write for {} was dropped", key);
        }
        return;
    }

    match client.put_and_wait(key, value, options.expiry, false).await {
        Ok(response) if !response.status().is_success() => {
            debug!("Cache write for {} returned {}", key, response.status());
        }
        Ok(_) => {}
        Err(e) => debug!("Cache write for {} failed: {}", key, e),
    }
}
