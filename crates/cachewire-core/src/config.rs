//! Configuration surface read at construction time
//!
//! Values are looked up by dotted key through [`ConfigSource`]. The cache
//! section name is chosen by the owner (default [`DEFAULT_SECTION`]); the
//! transport keys live under fixed `http.` and `proxy.` prefixes.

use cachewire_transport::{ClientOptions, ProxyCredentials, ProxySettings, TransportSettings};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Section read by [`CacheSettings::from_source`] when the owner has no preference
pub const DEFAULT_SECTION: &str = "cache";

pub const DEFAULT_PREFIX_URL: &str = "rest/";
pub const DEFAULT_SCHEMA: &str = "http";
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_WRITE_WORKERS: usize = 4;
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;

/// String lookup by dotted key
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for config::Config {
    fn get(&self, key: &str) -> Option<String> {
        self.get_string(key).ok()
    }
}

/// Cache manager settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Path prefix inserted before the collection id, e.g. `rest/`
    pub prefix_url: String,
    /// Upper bound on a single read
    pub read_timeout: Duration,
    /// `host[:port]` entries, combined with `schema` into endpoints
    pub servers: Vec<String>,
    pub schema: String,
    /// Credential sent as `Authorization: Basic base64(..)` when present
    pub authentication: Option<String>,
    /// Background write workers
    pub write_workers: usize,
    /// Pending background writes before new ones are dropped
    pub write_queue_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix_url: DEFAULT_PREFIX_URL.to_string(),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            servers: Vec::new(),
            schema: DEFAULT_SCHEMA.to_string(),
            authentication: None,
            write_workers: DEFAULT_WRITE_WORKERS,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
        }
    }
}

impl CacheSettings {
    /// Read `{section}.*` keys, falling back to defaults for missing ones
    pub fn from_source(source: &dyn ConfigSource, section: &str) -> Result<Self, ConfigError> {
        let key = |name: &str| format!("{section}.{name}");
        let defaults = Self::default();

        let servers = lookup(source, &key("servers"))
            .map(|value| split_list(&value, ';'))
            .unwrap_or_default();

        Ok(Self {
            prefix_url: lookup(source, &key("prefix_url")).unwrap_or(defaults.prefix_url),
            read_timeout: Duration::from_secs(parse_or(
                source,
                &key("timeout_secs"),
                DEFAULT_READ_TIMEOUT_SECS,
            )?),
            servers,
            schema: lookup(source, &key("schema")).unwrap_or(defaults.schema),
            authentication: lookup(source, &key("authentication")),
            write_workers: parse_or(source, &key("write_workers"), DEFAULT_WRITE_WORKERS)?.max(1),
            write_queue_capacity: parse_or(
                source,
                &key("write_queue_capacity"),
                DEFAULT_WRITE_QUEUE_CAPACITY,
            )?
            .max(1),
        })
    }
}

/// Read the `http.*` and `proxy.*` keys into transport settings
pub fn transport_settings_from(source: &dyn ConfigSource) -> Result<TransportSettings, ConfigError> {
    let defaults = TransportSettings::default();

    let direct = ClientOptions {
        allow_auto_redirect: parse_bool(source, "http.allow_auto_redirect", false)?,
        use_cookies: parse_bool(source, "http.use_cookies", false)?,
        ignore_certificate_validation: parse_bool(source, "http.ignore_certificate_validation", false)?,
    };

    let credentials = if parse_bool(source, "proxy.credentials.enabled", false)? {
        Some(ProxyCredentials {
            user: lookup(source, "proxy.credentials.user").unwrap_or_default(),
            password: lookup(source, "proxy.credentials.password").unwrap_or_default(),
        })
    } else {
        None
    };

    let proxy = ProxySettings {
        enabled: parse_bool(source, "proxy.enabled", false)?,
        address: lookup(source, "proxy.address"),
        bypass_local: parse_bool(source, "proxy.bypass_local", false)?,
        exceptions: lookup(source, "proxy.exceptions")
            .map(|value| split_list(&value, ','))
            .unwrap_or_default(),
        client: ClientOptions {
            allow_auto_redirect: parse_bool(source, "proxy.allow_auto_redirect", false)?,
            use_cookies: parse_bool(source, "proxy.use_cookies", false)?,
            ignore_certificate_validation: parse_bool(
                source,
                "proxy.ignore_certificate_validation",
                false,
            )?,
        },
        credentials,
    };

    Ok(TransportSettings {
        default_base_url: lookup(source, "http.default_base_url"),
        client_timeout_minutes: parse_or(
            source,
            "http.client_timeout_minutes",
            defaults.client_timeout_minutes,
        )?,
        direct,
        proxy,
    })
}

/// Trimmed, non-empty value for a key
fn lookup(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(source: &dyn ConfigSource, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(source, key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(source: &dyn ConfigSource, key: &str, default: bool) -> Result<bool, ConfigError> {
    match lookup(source, key) {
        Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
        Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
        Some(value) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            reason: "expected true or false".to_string(),
        }),
        None => Ok(default),
    }
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
