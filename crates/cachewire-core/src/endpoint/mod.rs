//! Cache server endpoints and round-robin selection

mod pool;

pub use pool::ServerPool;

use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::PoolError;

/// Base address of one cache server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parse an absolute `scheme://host[:port]` address
    pub fn parse(address: &str) -> Result<Self, PoolError> {
        let invalid = |reason: String| PoolError::InvalidEndpoint {
            address: address.to_string(),
            reason,
        };

        let url = Url::parse(address.trim()).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Self(url))
    }

    /// Combine a schema and a `host[:port]` entry from configuration
    pub fn from_server(schema: &str, server: &str) -> Result<Self, PoolError> {
        Self::parse(&format!("{}://{}", schema, server.trim()))
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
