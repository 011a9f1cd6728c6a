//! Inbound header propagation

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::future::Future;

use crate::error::TransportError;

/// Inbound headers copied onto every outgoing request
pub const PROPAGATED_HEADERS: [&str; 4] =
    ["authorization", "correlationid", "user-agent", "x-forwarded-for"];

/// Access to the headers of the inbound request being served
pub trait InboundHeaders: Send + Sync {
    fn header(&self, name: &str) -> Option<HeaderValue>;
}

tokio::task_local! {
    static INBOUND: HeaderMap;
}

/// Inbound headers stored in a tokio task-local scope.
///
/// A server wraps each request handler with [`TaskLocalInbound::scope`];
/// transport calls made inside that future see the handler's headers.
/// Outside a scope no headers are available.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskLocalInbound;

impl TaskLocalInbound {
    /// Run `future` with `headers` as the ambient inbound request
    pub async fn scope<F: Future>(headers: HeaderMap, future: F) -> F::Output {
        INBOUND.scope(headers, future).await
    }
}

impl InboundHeaders for TaskLocalInbound {
    fn header(&self, name: &str) -> Option<HeaderValue> {
        INBOUND.try_with(|headers| headers.get(name).cloned()).ok().flatten()
    }
}

impl InboundHeaders for HeaderMap {
    fn header(&self, name: &str) -> Option<HeaderValue> {
        self.get(name).cloned()
    }
}

/// Copy whitelisted inbound headers without overriding ones already set
pub(crate) fn propagate(target: &mut HeaderMap, inbound: &dyn InboundHeaders) {
    for name in PROPAGATED_HEADERS {
        if target.contains_key(name) {
            continue;
        }
        if let Some(value) = inbound.header(name) {
            target.insert(HeaderName::from_static(name), value);
        }
    }
}

/// Build a header map from string pairs
pub fn header_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<HeaderMap, TransportError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = HeaderMap::new();

    for (name, value) in pairs {
        let name = name.as_ref();
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value.as_ref()).map_err(|e| TransportError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}
