//! Tokenwire configuration structures to map the tokenwire.toml configuration.
//!
//! Every field has a default pointing at the local development setup, so an
//! empty (or missing) file is a valid configuration.

#![deny(missing_docs)]

mod bench;
mod loader;
mod tls;
mod upstream;

use std::{borrow::Cow, net::SocketAddr, path::Path, time::Duration};

pub use bench::{BenchConfig, DEFAULT_PROMPTS};
use duration_str::deserialize_duration;
use serde::Deserialize;
pub use tls::TlsServerConfig;
pub use upstream::UpstreamConfig;

/// Main configuration structure for tokenwire.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The OpenAI-compatible completion API every transport streams from.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Certificate and key shared by the HTTPS and QUIC listeners.
    #[serde(default)]
    pub tls: TlsServerConfig,
    /// WebTransport server settings.
    #[serde(default)]
    pub webtransport: WebTransportConfig,
    /// HTTP/SSE server settings.
    #[serde(default)]
    pub sse: SseConfig,
    /// TLS reverse proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Benchmark settings.
    #[serde(default)]
    pub bench: BenchConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates values serde cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

/// WebTransport (HTTP/3 over QUIC) server settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebTransportConfig {
    /// UDP address the QUIC endpoint binds to.
    pub listen_address: SocketAddr,
    /// Path a session request must target to be accepted.
    pub path: Cow<'static, str>,
    /// Idle time after which QUIC closes a silent connection.
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_idle_timeout: Duration,
    /// Interval between QUIC keep-alive packets.
    #[serde(deserialize_with = "deserialize_duration")]
    pub keep_alive_interval: Duration,
}

impl Default for WebTransportConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 4433)),
            path: Cow::Borrowed("/wt"),
            max_idle_timeout: Duration::from_secs(5 * 60),
            keep_alive_interval: Duration::from_secs(30),
        }
    }
}

/// HTTP/SSE server settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SseConfig {
    /// TCP address the HTTPS listener binds to.
    pub listen_address: SocketAddr,
    /// Path of the chat endpoint.
    pub path: Cow<'static, str>,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: Cow::Borrowed("/chat"),
        }
    }
}

/// TLS reverse proxy settings. The proxy always forwards to `upstream.base_url`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// TCP address the HTTPS listener binds to.
    pub listen_address: SocketAddr,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([127, 0, 0, 1], 11435)),
        }
    }
}
