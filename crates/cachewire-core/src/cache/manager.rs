//! Cache manager over a pool of REST cache servers

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cachewire_transport::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use cachewire_transport::{
    HttpTransport, JsonCodec, MediaType, Payload, RequestOptions, Response, TransportError,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::client::CacheClient;
use super::expiry::{Expiry, apply_perform_async};
use super::key::CacheKey;
use super::queue::WorkQueue;
use super::value::CacheValue;
use crate::config::{CacheSettings, ConfigSource};
use crate::endpoint::ServerPool;
use crate::error::CoreError;

/// Background write
enum WriteJob {
    Put {
        key: CacheKey,
        body: String,
        expiry: Expiry,
    },
    Delete {
        key: CacheKey,
    },
}

/// Reads, writes and deletes cache entries on a rotating set of servers.
///
/// Must be created inside a tokio runtime: background writes run on worker
/// tasks spawned at construction. Call [`CacheManager::shutdown`] before
/// exit so queued writes reach the server.
pub struct CacheManager {
    inner: Arc<ManagerInner>,
    writes: WorkQueue<WriteJob>,
}

struct ManagerInner {
    transport: Arc<HttpTransport>,
    pool: Arc<ServerPool>,
    settings: CacheSettings,
    default_headers: HeaderMap,
}

impl CacheManager {
    /// Create a manager for the servers named in `settings`
    pub fn new(transport: Arc<HttpTransport>, settings: CacheSettings) -> Result<Self, CoreError> {
        let pool = ServerPool::from_servers(&settings.schema, &settings.servers.join(";"))?;
        Self::with_pool(transport, Arc::new(pool), settings)
    }

    /// Create a manager from the `{section}.*` configuration keys
    pub fn from_config(
        transport: Arc<HttpTransport>,
        source: &dyn ConfigSource,
        section: &str,
    ) -> Result<Self, CoreError> {
        let settings = CacheSettings::from_source(source, section)?;
        Self::new(transport, settings)
    }

    /// Create a manager over an existing pool; `settings.servers` is ignored
    pub fn with_pool(
        transport: Arc<HttpTransport>,
        pool: Arc<ServerPool>,
        settings: CacheSettings,
    ) -> Result<Self, CoreError> {
        let default_headers = default_headers(settings.authentication.as_deref())?;

        info!(
            "Initializing cache manager (endpoints: {}, prefix: {}, read timeout: {:?})",
            pool.len(),
            settings.prefix_url,
            settings.read_timeout
        );

        let inner = Arc::new(ManagerInner {
            transport,
            pool,
            settings,
            default_headers,
        });

        let worker_inner = inner.clone();
        let writes = WorkQueue::start(
            "cache write",
            inner.settings.write_workers,
            inner.settings.write_queue_capacity,
            move |job: WriteJob| {
                let inner = worker_inner.clone();
                async move { inner.run(job).await }
            },
        )?;

        Ok(Self { inner, writes })
    }

    /// Pool shared with the owner, who may add or remove endpoints
    pub fn server_pool(&self) -> &Arc<ServerPool> {
        &self.inner.pool
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Background writes dropped because the queue was full or closed
    pub fn dropped_writes(&self) -> u64 {
        self.writes.dropped()
    }

    /// Stop accepting background writes and wait for queued ones
    pub async fn shutdown(&self) {
        self.writes.shutdown().await;
    }

    fn enqueue(&self, job: WriteJob) -> bool {
        self.writes.submit(job)
    }
}

#[async_trait]
impl CacheClient for CacheManager {
    fn codec(&self) -> &JsonCodec {
        self.inner.transport.codec()
    }

    async fn get(&self, key: &CacheKey) -> String {
        let timeout = self.inner.settings.read_timeout;
        let result = match tokio::time::timeout(timeout, self.inner.read(key)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout(timeout)),
        };

        match result {
            Ok(value) => value,
            Err(e) => {
                debug!("Cache read for {} returned nothing: {}", key, e);
                String::new()
            }
        }
    }

    fn put(&self, key: &CacheKey, value: CacheValue, expiry: Expiry) -> bool {
        match value.into_body(self.codec()) {
            Ok(body) => self.enqueue(WriteJob::Put {
                key: key.clone(),
                body,
                expiry,
            }),
            Err(e) => {
                debug!("Skipping cache write for {}: {}", key, e);
                false
            }
        }
    }

    async fn put_and_wait(
        &self,
        key: &CacheKey,
        value: CacheValue,
        expiry: Expiry,
        perform_async: bool,
    ) -> Result<Response, CoreError> {
        let body = value.into_body(self.codec())?;
        self.inner.write(key, body, expiry, perform_async).await
    }

    fn delete(&self, key: &CacheKey) -> bool {
        self.enqueue(WriteJob::Delete { key: key.clone() })
    }

    async fn delete_and_wait(
        &self,
        key: &CacheKey,
        perform_async: bool,
    ) -> Result<Response, CoreError> {
        self.inner.remove(key, perform_async).await
    }
}

impl ManagerInner {
    async fn read(&self, key: &CacheKey) -> Result<String, CoreError> {
        let endpoint = self.pool.next()?;
        let path = key.entry_path(&self.settings.prefix_url);

        let response = self
            .transport
            .get(Some(endpoint.as_str()), &path, self.options(self.default_headers.clone()))
            .await?;

        if !response.status().is_success() {
            debug!("Cache miss for {} on {} ({})", key, endpoint, response.status());
            return Err(CoreError::CacheMiss);
        }

        Ok(response.text().await.map_err(TransportError::from)?)
    }

    async fn write(
        &self,
        key: &CacheKey,
        body: String,
        expiry: Expiry,
        perform_async: bool,
    ) -> Result<Response, CoreError> {
        let endpoint = self.pool.next()?;
        let path = key.entry_path(&self.settings.prefix_url);

        let mut headers = self.default_headers.clone();
        expiry.apply(&mut headers);
        apply_perform_async(&mut headers, perform_async);

        debug!("Writing {} to {}", key, endpoint);
        Ok(self
            .transport
            .put(
                Some(endpoint.as_str()),
                &path,
                Payload::Text(body),
                self.options(headers),
            )
            .await?)
    }

    async fn remove(&self, key: &CacheKey, perform_async: bool) -> Result<Response, CoreError> {
        let endpoint = self.pool.next()?;
        let path = key.delete_path(&self.settings.prefix_url);

        let mut headers = self.default_headers.clone();
        apply_perform_async(&mut headers, perform_async);

        debug!("Deleting {} on {}", key, endpoint);
        Ok(self
            .transport
            .delete(Some(endpoint.as_str()), &path, self.options(headers))
            .await?)
    }

    async fn run(&self, job: WriteJob) {
        let (key, result) = match job {
            WriteJob::Put { key, body, expiry } => {
                let result = self.write(&key, body, expiry, true).await;
                (key, result)
            }
            WriteJob::Delete { key } => {
                let result = self.remove(&key, true).await;
                (key, result)
            }
        };

        match result {
            Ok(response) if !response.status().is_success() => {
                debug!("Background write for {} returned {}", key, response.status());
            }
            Ok(_) => {}
            Err(e) => debug!("Background write for {} failed: {}", key, e),
        }
    }

    fn options(&self, headers: HeaderMap) -> RequestOptions {
        RequestOptions::new()
            .with_headers(headers)
            .with_media_type(MediaType::Text)
    }
}

/// `Accept: text/plain`, plus basic authorization when a credential is set
fn default_headers(authentication: Option<&str>) -> Result<HeaderMap, CoreError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(MediaType::Text.as_str()));

    if let Some(credential) = authentication.filter(|c| !c.is_empty()) {
        let value = format!("Basic {}", STANDARD.encode(credential));
        let value = HeaderValue::from_str(&value).map_err(|e| TransportError::InvalidHeader {
            name: AUTHORIZATION.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}
