//! ttt-relay
//!
//! Streaming relay between browser clients and a hosted text-generation
//! API. A client request is merged with defaults, forwarded upstream, and
//! the provider's newline-delimited JSON output is relayed back chunk by
//! chunk over either a duplex WebSocket or a one-shot chunked HTTP
//! response.
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod params;
pub mod relay;
pub mod server;
pub mod streaming;
pub mod upstream;

pub use error::RelayError;
