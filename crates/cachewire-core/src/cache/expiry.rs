//! Write expiry headers

use cachewire_transport::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// TTL attached to writes that specify neither TTL nor idle timeout
pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(3600);

pub const TIME_TO_LIVE_HEADER: &str = "timetoliveseconds";
pub const MAX_IDLE_HEADER: &str = "maxidletimeseconds";
pub const PERFORM_ASYNC_HEADER: &str = "performasync";

/// Entry lifetime requested on a write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expiry {
    pub time_to_live: Option<Duration>,
    pub max_idle: Option<Duration>,
}

impl Expiry {
    /// Server defaults apart from the client-side default TTL
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ttl(time_to_live: Duration) -> Self {
        Self::default().with_ttl(time_to_live)
    }

    pub fn idle(max_idle: Duration) -> Self {
        Self::default().with_idle(max_idle)
    }

    pub fn with_ttl(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = Some(time_to_live);
        self
    }

    pub fn with_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = Some(max_idle);
        self
    }

    /// Expiry headers for a write.
    ///
    /// An idle timeout alone suppresses the default TTL.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(idle) = self.max_idle {
            insert_seconds(headers, MAX_IDLE_HEADER, idle);
        }

        match (self.time_to_live, self.max_idle) {
            (Some(ttl), _) => insert_seconds(headers, TIME_TO_LIVE_HEADER, ttl),
            (None, None) => insert_seconds(headers, TIME_TO_LIVE_HEADER, DEFAULT_TIME_TO_LIVE),
            (None, Some(_)) => {}
        }
    }
}

pub(crate) fn apply_perform_async(headers: &mut HeaderMap, perform_async: bool) {
    headers.insert(
        HeaderName::from_static(PERFORM_ASYNC_HEADER),
        HeaderValue::from_static(if perform_async { "true" } else { "false" }),
    );
}

/// `3600`, `1.5`
fn format_seconds(duration: Duration) -> String {
    format!("{}", duration.as_secs_f64())
}

fn insert_seconds(headers: &mut HeaderMap, name: &'static str, duration: Duration) {
    if let Ok(value) = HeaderValue::from_str(&format_seconds(duration)) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
