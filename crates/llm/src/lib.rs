//! Streaming client for OpenAI-compatible chat completion APIs.
//!
//! [`UpstreamClient::stream_chat_completion`] posts a `stream: true` request, scans
//! the `data: <json>` lines of the response body and hands every non-empty
//! `choices[0].delta.content` to a [`TokenSink`] the moment its line is parsed.

use async_trait::async_trait;

mod client;
mod error;
mod messages;
mod scanner;

pub use client::UpstreamClient;
pub use error::LlmError;
pub use messages::{ChatChunk, ChatMessage, ChatRequest, ChunkChoice, DataLine, Delta, Usage, parse_data_line};

pub type Result<T> = std::result::Result<T, LlmError>;

/// Receives tokens, in upstream order, while a completion streams.
///
/// Returning an error aborts the stream; the adapter reports it as [`LlmError::Sink`].
#[async_trait]
pub trait TokenSink: Send {
    async fn send_token(&mut self, token: &str) -> anyhow::Result<()>;
}

/// Byte and token accounting for one streamed completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Wire bytes of the content-bearing upstream lines, newline included.
    pub bytes_received: usize,
    /// Total size of the tokens handed to the sink.
    pub bytes_sent: usize,
    /// Prompt tokens reported by the upstream's usage chunk, if any.
    pub prompt_tokens: u64,
    /// Completion tokens reported by the upstream's usage chunk, if any.
    pub completion_tokens: u64,
}
