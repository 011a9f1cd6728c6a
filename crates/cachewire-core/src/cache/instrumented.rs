//! Tracing and metrics around any [`CacheClient`]

use async_trait::async_trait;
use cachewire_transport::{JsonCodec, Response};
use metrics::{counter, histogram};
use std::time::Instant;
use tracing::debug;

use super::client::CacheClient;
use super::expiry::Expiry;
use super::key::CacheKey;
use super::value::CacheValue;
use crate::error::CoreError;

/// Decorator recording one event, a counter and a latency sample per call.
///
/// Metrics are emitted through the `metrics` facade; nothing is recorded
/// unless the process installs a recorder.
pub struct InstrumentedCache<C> {
    inner: C,
}

impl<C: CacheClient> InstrumentedCache<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: CacheClient> CacheClient for InstrumentedCache<C> {
    fn codec(&self) -> &JsonCodec {
        self.inner.codec()
    }

    async fn get(&self, key: &CacheKey) -> String {
        let started = Instant::now();
        let value = self.inner.get(key).await;
        let outcome = if value.is_empty() { "miss" } else { "hit" };
        record("get", outcome, key, started);
        value
    }

    fn put(&self, key: &CacheKey, value: CacheValue, expiry: Expiry) -> bool {
        let started = Instant::now();
        let queued = self.inner.put(key, value, expiry);
        record("put", queued_outcome(queued), key, started);
        queued
    }

    async fn put_and_wait(
        &self,
        key: &CacheKey,
        value: CacheValue,
        expiry: Expiry,
        perform_async: bool,
    ) -> Result<Response, CoreError> {
        let started = Instant::now();
        let result = self.inner.put_and_wait(key, value, expiry, perform_async).await;
        record("put_and_wait", outcome_of(&result), key, started);
        result
    }

    fn delete(&self, key: &CacheKey) -> bool {
        let started = Instant::now();
        let queued = self.inner.delete(key);
        record("delete", queued_outcome(queued), key, started);
        queued
    }

    async fn delete_and_wait(
        &self,
        key: &CacheKey,
        perform_async: bool,
    ) -> Result<Response, CoreError> {
        let started = Instant::now();
        let result = self.inner.delete_and_wait(key, perform_async).await;
        record("delete_and_wait", outcome_of(&result), key, started);
        result
    }
}

fn queued_outcome(queued: bool) -> &'static str {
    if queued { "queued" } else { "dropped" }
}

fn outcome_of(result: &Result<Response, CoreError>) -> &'static str {
    match result {
        Ok(response) if response.status().is_success() => "ok",
        Ok(_) => "rejected",
        Err(_) => "error",
    }
}

fn record(operation: &'static str, outcome: &'static str, key: &CacheKey, started: Instant) {
    let elapsed = started.elapsed();

    counter!(
        "cachewire_cache_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "cachewire_cache_operation_duration_seconds",
        "operation" => operation
    )
    .record(elapsed.as_secs_f64());

    debug!(
        operation,
        outcome,
        collection = key.collection(),
        elapsed_ms = elapsed.as_millis() as u64,
        "cache operation"
    );
}
