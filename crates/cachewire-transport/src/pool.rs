//! Per-base-address client pool

use dashmap::DashMap;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};
use url::Url;

use crate::error::TransportError;
use crate::proxy::{BypassList, build_client};
use crate::settings::TransportSettings;

/// Owns one reusable client per distinct base address.
///
/// Clients are created lazily on first use and kept until [`ClientPool::clear`]
/// or until the pool is dropped. Creation goes through the map's entry API,
/// so concurrent first use of the same address builds a single client.
#[derive(Debug)]
pub struct ClientPool {
    settings: TransportSettings,
    bypass: BypassList,
    clients: DashMap<String, Client>,
    created: AtomicUsize,
}

impl ClientPool {
    /// Create an empty pool
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let bypass = BypassList::new(&settings.proxy.exceptions)?;

        info!(
            "Initializing client pool (proxy: {}, bypass patterns: {}, timeout: {:?})",
            settings.proxy.enabled,
            bypass.len(),
            settings.client_timeout()
        );

        Ok(Self {
            settings,
            bypass,
            clients: DashMap::new(),
            created: AtomicUsize::new(0),
        })
    }

    /// Get the client for a base address, building it on first use
    pub fn get_or_create(&self, base_address: &str) -> Result<Client, TransportError> {
        let key = normalize(base_address);

        if let Some(client) = self.clients.get(key) {
            return Ok(client.clone());
        }

        Url::parse(key).map_err(|e| TransportError::InvalidBaseAddress(format!("{key}: {e}")))?;

        let entry = self.clients.entry(key.to_string()).or_try_insert_with(|| {
            let client = build_client(&self.settings, &self.bypass, key)?;
            self.created.fetch_add(1, Ordering::Relaxed);
            debug!("Created client for {}", key);
            Ok::<_, TransportError>(client)
        })?;

        Ok(entry.value().clone())
    }

    /// Whether a client exists for this base address
    pub fn contains(&self, base_address: &str) -> bool {
        self.clients.contains_key(normalize(base_address))
    }

    /// Number of cached clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Total number of clients ever built by this pool
    pub fn clients_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Drop every cached client
    pub fn clear(&self) {
        let count = self.clients.len();
        self.clients.clear();
        info!("Released {} pooled clients", count);
    }
}

fn normalize(base_address: &str) -> &str {
    base_address.trim_end_matches('/')
}
