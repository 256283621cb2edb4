//! Process-wide configuration.
//!
//! All configuration is read once at startup and passed into session
//! construction as an immutable value; sessions never consult ambient
//! global state. A missing credential or origin is fatal before the
//! listener binds.

use std::net::SocketAddr;

use secrecy::SecretString;

use crate::error::{RelayError, Result};

/// Default generation endpoint of the upstream provider.
pub const DEFAULT_GENERATE_ENDPOINT: &str =
    "https://api.inferkit.com/v1/models/standard/generate";

/// Default listen address when `LISTEN_ADDR` is not set.
const DEFAULT_LISTEN_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8011);

/// Immutable process configuration, shared read-only across sessions.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Upstream generation endpoint (`POST`).
    pub generate_endpoint: String,
    /// Bearer token for the upstream provider.
    pub api_key: SecretString,
    /// Origin allowed to open duplex connections.
    pub allowed_origin: String,
}

impl RelayConfig {
    /// Read configuration from the environment.
    ///
    /// `INFERKIT_API_KEY` and `ORIGIN` are required; `LISTEN_ADDR` and
    /// `INFERKIT_API_URL` are optional overrides.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("INFERKIT_API_KEY").map_err(|_| {
            RelayError::Config(
                "cannot continue without an InferKit API key (INFERKIT_API_KEY)".into(),
            )
        })?;
        let allowed_origin = std::env::var("ORIGIN")
            .map_err(|_| RelayError::Config("cannot continue without an origin (ORIGIN)".into()))?;

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| RelayError::Config(format!("bad LISTEN_ADDR {raw:?}: {e}")))?,
            Err(_) => SocketAddr::from(DEFAULT_LISTEN_ADDR),
        };

        let generate_endpoint = std::env::var("INFERKIT_API_URL")
            .unwrap_or_else(|_| DEFAULT_GENERATE_ENDPOINT.to_string());

        Ok(Self {
            listen_addr,
            generate_endpoint,
            api_key: SecretString::from(api_key),
            allowed_origin,
        })
    }
}
