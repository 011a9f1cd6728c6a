//! cachewire HTTP transport
//!
//! This crate provides the verb-agnostic HTTP executor used to talk to
//! cache servers, handling per-address client reuse, proxy selection,
//! inbound header propagation and body encoding.

pub mod client;
pub mod codec;
pub mod error;
pub mod headers;
pub mod pool;
pub mod proxy;
pub mod settings;

pub use client::{HttpTransport, MediaType, Payload, RequestOptions};
pub use codec::JsonCodec;
pub use error::TransportError;
pub use headers::{InboundHeaders, PROPAGATED_HEADERS, TaskLocalInbound};
pub use pool::ClientPool;
pub use proxy::BypassList;
pub use settings::{ClientOptions, ProxyCredentials, ProxySettings, TransportSettings};

pub use reqwest::{Method, Response, StatusCode, header};
