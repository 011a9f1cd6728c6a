//! Transport error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid base address: {0}")]
    InvalidBaseAddress(String),

    #[error("No base address given and no default configured")]
    MissingBaseAddress,

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Invalid proxy bypass pattern '{pattern}': {source}")]
    InvalidBypassPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot encode body as {media_type}: {reason}")]
    Encoding {
        media_type: &'static str,
        reason: String,
    },

    #[error("Remote returned error: {status} - {message}")]
    Remote { status: u16, message: String },

    #[error("StatusCode='{status}' Body='{body}'")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// HTTP status carried by the error, if the remote answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Remote { status, .. } | TransportError::Status { status, .. } => {
                Some(*status)
            }
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
