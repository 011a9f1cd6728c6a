//! In-process REST cache server for integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use cachewire_core::{CacheManager, CacheSettings, Endpoint, ServerPool};
use cachewire_transport::{HttpTransport, TransportSettings};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// One request seen by the mock server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
pub struct MockCache {
    entries: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<Recorded>>,
    delay: Mutex<Option<Duration>>,
}

impl MockCache {
    pub fn entry(&self, path: &str) -> Option<String> {
        self.entries.lock().get(path).cloned()
    }

    pub fn insert(&self, path: &str, value: &str) {
        self.entries.lock().insert(path.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// Delay every response by `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

async fn handle(
    State(cache): State<Arc<MockCache>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body = String::from_utf8_lossy(&body).into_owned();

    cache.requests.lock().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        headers,
        body: body.clone(),
    });

    let delay = *cache.delay.lock();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    match method {
        Method::GET => match cache.entry(&path) {
            Some(value) => (StatusCode::OK, value).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::PUT | Method::POST => {
            cache.insert(&path, &body);
            StatusCode::NO_CONTENT.into_response()
        }
        Method::DELETE => match cache.entries.lock().remove(&path) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// Start a mock cache server on an ephemeral port
pub async fn start() -> (SocketAddr, Arc<MockCache>) {
    let cache = Arc::new(MockCache::default());
    let app = Router::new().fallback(handle).with_state(cache.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, cache)
}

pub fn endpoint(addr: SocketAddr) -> Endpoint {
    Endpoint::parse(&format!("http://{addr}")).unwrap()
}

pub fn transport() -> Arc<HttpTransport> {
    Arc::new(HttpTransport::new(TransportSettings::default()).unwrap())
}

pub fn settings() -> CacheSettings {
    CacheSettings {
        read_timeout: Duration::from_millis(500),
        write_workers: 2,
        write_queue_capacity: 64,
        ..Default::default()
    }
}

/// Manager over the given mock servers
pub fn manager(addrs: &[SocketAddr], settings: CacheSettings) -> CacheManager {
    let pool = ServerPool::with_endpoints(addrs.iter().copied().map(endpoint));
    CacheManager::with_pool(transport(), Arc::new(pool), settings).unwrap()
}

/// Poll until `condition` holds or two seconds pass
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
