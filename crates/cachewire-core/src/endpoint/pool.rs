//! Round-robin server pool

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::Endpoint;
use crate::error::PoolError;

/// Ordered set of cache servers handed out in rotation.
///
/// Insertion order is rotation order. Selection holds the read lock while
/// it advances the cursor, so the cursor is always a valid index for the
/// sequence it is applied to. Mutations take the write lock and re-anchor
/// the cursor.
#[derive(Debug, Default)]
pub struct ServerPool {
    endpoints: RwLock<Vec<Endpoint>>,
    cursor: AtomicUsize,
}

impl ServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints.into_iter().collect()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build a pool from `schema` and a `;`-separated server list.
    /// Entries are trimmed; empty ones are skipped.
    pub fn from_servers(schema: &str, servers: &str) -> Result<Self, PoolError> {
        let endpoints = servers
            .split(';')
            .map(str::trim)
            .filter(|server| !server.is_empty())
            .map(|server| Endpoint::from_server(schema, server))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Initializing server pool with {} endpoints", endpoints.len());
        Ok(Self::with_endpoints(endpoints))
    }

    /// Append an endpoint; duplicates are kept
    pub fn add(&self, endpoint: Endpoint) {
        debug!("Adding endpoint {}", endpoint);
        self.endpoints.write().push(endpoint);
    }

    /// Remove the endpoint at `index`
    pub fn remove_at(&self, index: usize) -> Result<Endpoint, PoolError> {
        let mut endpoints = self.endpoints.write();
        let len = endpoints.len();
        if index >= len {
            return Err(PoolError::IndexOutOfRange { index, len });
        }

        let removed = endpoints.remove(index);
        let remaining = endpoints.len();

        // Endpoints after `index` shifted down by one; keep pointing at the
        // one that was due next.
        let _ = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                Some(match cursor {
                    _ if remaining == 0 => 0,
                    c if c > index => c - 1,
                    c if c >= remaining => 0,
                    c => c,
                })
            });

        debug!("Removed endpoint {} ({} remaining)", removed, remaining);
        Ok(removed)
    }

    /// Hand out the endpoint at the cursor and advance it
    pub fn next(&self) -> Result<Endpoint, PoolError> {
        let endpoints = self.endpoints.read();
        let len = endpoints.len();
        if len == 0 {
            return Err(PoolError::Empty);
        }

        let (Ok(current) | Err(current)) =
            self.cursor
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                    Some((cursor + 1) % len)
                });

        Ok(endpoints[current % len].clone())
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// Snapshot of the endpoints in rotation order
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.read().clone()
    }
}
