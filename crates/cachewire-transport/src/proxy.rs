//! Proxy selection and client construction

use regex::{Regex, RegexBuilder};
use reqwest::redirect::Policy;
use reqwest::{Client, NoProxy, Proxy};
use tracing::debug;

use crate::error::TransportError;
use crate::settings::{ClientOptions, TransportSettings};

/// Loopback destinations skipped when `bypass_local` is set
const LOCAL_ADDRESSES: &str = "localhost,127.0.0.1,::1";

/// Base addresses that must not go through the forward proxy
#[derive(Debug, Clone, Default)]
pub struct BypassList {
    patterns: Vec<Regex>,
}

impl BypassList {
    /// Compile exception patterns. Blank entries are ignored.
    pub fn new<S: AsRef<str>>(exceptions: &[S]) -> Result<Self, TransportError> {
        let mut patterns = Vec::with_capacity(exceptions.len());

        for exception in exceptions {
            let pattern = exception.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }

            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| TransportError::InvalidBypassPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            patterns.push(regex);
        }

        Ok(Self { patterns })
    }

    /// Parse a comma-separated exception list
    pub fn parse(exceptions: &str) -> Result<Self, TransportError> {
        let parts: Vec<&str> = exceptions.split(',').collect();
        Self::new(&parts)
    }

    /// Whether any pattern matches somewhere in the base address
    pub fn matches(&self, base_address: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(base_address))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Whether a client for this base address goes through the proxy
pub fn should_proxy(settings: &TransportSettings, bypass: &BypassList, base_address: &str) -> bool {
    settings.proxy.enabled && !bypass.matches(base_address)
}

/// Build the client used for one base address
pub(crate) fn build_client(
    settings: &TransportSettings,
    bypass: &BypassList,
    base_address: &str,
) -> Result<Client, TransportError> {
    let proxied = should_proxy(settings, bypass, base_address);
    let options = if proxied {
        &settings.proxy.client
    } else {
        &settings.direct
    };

    let mut builder = apply_options(Client::builder(), options).timeout(settings.client_timeout());

    if proxied {
        if let Some(address) = settings
            .proxy
            .address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
        {
            let mut proxy = Proxy::all(address)?;

            if let Some(credentials) = &settings.proxy.credentials {
                proxy = proxy.basic_auth(&credentials.user, &credentials.password);
            }

            if settings.proxy.bypass_local {
                proxy = proxy.no_proxy(NoProxy::from_string(LOCAL_ADDRESSES));
            }

            builder = builder.proxy(proxy);
        }
        debug!("Building proxied client for {}", base_address);
    } else {
        builder = builder.no_proxy();
        debug!("Building direct client for {}", base_address);
    }

    Ok(builder.build()?)
}

fn apply_options(builder: reqwest::ClientBuilder, options: &ClientOptions) -> reqwest::ClientBuilder {
    let redirect = if options.allow_auto_redirect {
        Policy::default()
    } else {
        Policy::none()
    };

    builder
        .redirect(redirect)
        .cookie_store(options.use_cookies)
        .danger_accept_invalid_certs(options.ignore_certificate_validation)
}
