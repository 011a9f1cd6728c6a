//! Core error types

use cachewire_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Server pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Server pool is empty")]
    Empty,

    #[error("Endpoint index {index} out of range (pool size {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid endpoint address '{address}': {reason}")]
    InvalidEndpoint { address: String, reason: String },
}

/// Configuration errors raised while reading a [`crate::ConfigSource`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache miss")]
    CacheMiss,

    #[error("No tokio runtime available: {0}")]
    Runtime(String),
}
