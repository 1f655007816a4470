//! Upstream LLM configuration.

use serde::Deserialize;
use url::Url;

/// The OpenAI-compatible API the servers stream completions from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the API; `/v1/chat/completions` is appended to it.
    pub base_url: Url,
    /// Model identifier sent with every request.
    pub model: String,
}

impl UpstreamConfig {
    /// The base URL without a trailing slash, ready for path concatenation.
    pub fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://127.0.0.1:11434").expect("static URL is valid"),
            model: "gemma3:12b".to_string(),
        }
    }
}
