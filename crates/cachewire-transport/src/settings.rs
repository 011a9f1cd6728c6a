//! Transport settings

use std::time::Duration;
use tracing::warn;

/// Minimum allowed per-client request timeout, in minutes
pub const MIN_CLIENT_TIMEOUT_MINUTES: u64 = 1;

/// Maximum allowed per-client request timeout, in minutes
pub const MAX_CLIENT_TIMEOUT_MINUTES: u64 = 20;

/// Per-mode client toggles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Follow redirects returned by the server
    pub allow_auto_redirect: bool,
    /// Keep a cookie store on the client
    pub use_cookies: bool,
    /// Accept invalid TLS certificates
    pub ignore_certificate_validation: bool,
}

/// Basic credentials presented to the forward proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub user: String,
    pub password: String,
}

/// Forward proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    /// Route requests through the proxy unless the address is bypassed
    pub enabled: bool,
    /// Proxy URL; when absent the system proxy configuration applies
    pub address: Option<String>,
    /// Skip the proxy for loopback destinations
    pub bypass_local: bool,
    /// Case-insensitive regular expressions; a matching base address is
    /// served by a direct client
    pub exceptions: Vec<String>,
    /// Toggles for proxied clients
    pub client: ClientOptions,
    pub credentials: Option<ProxyCredentials>,
}

/// Settings shared by every client the transport creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Base address used when a call does not name one
    pub default_base_url: Option<String>,
    /// Per-client request timeout in minutes, clamped on use
    pub client_timeout_minutes: u64,
    /// Toggles for direct (non-proxied) clients
    pub direct: ClientOptions,
    pub proxy: ProxySettings,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            default_base_url: None,
            client_timeout_minutes: MIN_CLIENT_TIMEOUT_MINUTES,
            direct: ClientOptions::default(),
            proxy: ProxySettings::default(),
        }
    }
}

impl TransportSettings {
    /// Validated client timeout.
    /// Clamps to [1, 20] minutes and logs a warning if adjusted.
    pub fn client_timeout(&self) -> Duration {
        let minutes = if self.client_timeout_minutes < MIN_CLIENT_TIMEOUT_MINUTES {
            warn!(
                "client_timeout_minutes {} is below minimum {}, using minimum",
                self.client_timeout_minutes, MIN_CLIENT_TIMEOUT_MINUTES
            );
            MIN_CLIENT_TIMEOUT_MINUTES
        } else if self.client_timeout_minutes > MAX_CLIENT_TIMEOUT_MINUTES {
            warn!(
                "client_timeout_minutes {} exceeds maximum {}, using maximum",
                self.client_timeout_minutes, MAX_CLIENT_TIMEOUT_MINUTES
            );
            MAX_CLIENT_TIMEOUT_MINUTES
        } else {
            self.client_timeout_minutes
        };

        Duration::from_secs(minutes * 60)
    }
}
