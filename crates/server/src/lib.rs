//! Token streaming servers.
//!
//! Three front ends share one upstream [`UpstreamClient`](llm::UpstreamClient):
//!
//! - [`WebTransportServer`]: length-prefixed frames on WebTransport bidirectional streams,
//!   an empty frame ends each response.
//! - [`SseServer`]: `POST /chat` answered with `data: <token>` events, `data: [DONE]` ends
//!   the response.
//! - [`ReverseProxy`]: HTTPS in front of the plaintext upstream, so direct API clients pay
//!   the same handshake as the other two.

#![deny(missing_docs)]

mod proxy;
mod sse;
mod webtransport;

pub use proxy::ReverseProxy;
pub use sse::SseServer;
pub use webtransport::WebTransportServer;

use llm::{LlmError, Stats};

/// In-band payload carrying an upstream failure to the client.
fn error_payload(error: &LlmError) -> String {
    format!("\n[error: {error}]")
}

fn log_stats(prompt: &str, stats: &Stats) {
    log::info!(
        "stats: input={} bytes, from_llm={} bytes, to_client={} bytes, prompt_tokens={}, completion_tokens={}",
        prompt.len(),
        stats.bytes_received,
        stats.bytes_sent,
        stats.prompt_tokens,
        stats.completion_tokens,
    );
}
