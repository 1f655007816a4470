//! TLS configuration for secure connections.

use std::path::PathBuf;

use serde::Deserialize;

/// TLS configuration for secure connections.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Path to the TLS certificate PEM file.
    pub certificate: PathBuf,
    /// Path to the TLS private key PEM file.
    pub key: PathBuf,
}

impl Default for TlsServerConfig {
    fn default() -> Self {
        Self {
            certificate: PathBuf::from("certs/cert.pem"),
            key: PathBuf::from("certs/key.pem"),
        }
    }
}
