use thiserror::Error;

/// Failures while streaming a completion from the upstream API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response (connect, TLS or send failure).
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The upstream answered with a non-200 status.
    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The response body broke off while streaming.
    #[error("failed to read upstream body: {0}")]
    Body(#[source] reqwest::Error),

    /// The token consumer refused a token; streaming stops.
    #[error("failed to deliver token: {0}")]
    Sink(anyhow::Error),
}

impl LlmError {
    /// True when the failure came from the consumer side rather than the upstream.
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink(_))
    }
}
