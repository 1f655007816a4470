use config::UpstreamConfig;
use reqwest::{Client, Response, StatusCode};

use crate::{LlmError, Stats, TokenSink, messages::ChatRequest, scanner::ChunkScanner};

/// Upper bound on how much of an error body is kept for the error message.
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// Streams chat completions from an OpenAI-compatible API.
///
/// Holds no per-request state; clones share the connection pool and can be used
/// from any number of tasks at once.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    model: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> crate::Result<Self> {
        let client = Client::builder().build().map_err(|e| {
            log::error!("Failed to create HTTP client for the upstream: {e}");
            LlmError::Client(e)
        })?;

        Ok(Self::with_client(client, config.base(), &config.model))
    }

    pub fn with_client(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Streams the completion for `prompt`, handing every non-empty delta to `sink`
    /// as soon as its line has been parsed.
    ///
    /// The stats gathered so far are returned even when streaming fails, so callers
    /// can log what got through before the error.
    pub async fn stream_chat_completion<S>(&self, prompt: &str, sink: &mut S) -> (Stats, crate::Result<()>)
    where
        S: TokenSink + ?Sized,
    {
        let mut scanner = ChunkScanner::default();
        let result = self.stream_into(prompt, sink, &mut scanner).await;

        (scanner.stats(), result)
    }

    async fn stream_into<S>(&self, prompt: &str, sink: &mut S, scanner: &mut ChunkScanner) -> crate::Result<()>
    where
        S: TokenSink + ?Sized,
    {
        let mut response = self.post(prompt, true).await?;

        while let Some(chunk) = response.chunk().await.map_err(LlmError::Body)? {
            scanner.feed(&chunk, sink).await?;
        }

        scanner.finish(sink).await
    }

    /// Sends one non-streaming completion and discards the answer, so the upstream
    /// has the model loaded before anything is measured.
    pub async fn warm_up(&self) -> crate::Result<()> {
        let mut response = self.post("hi", false).await?;

        while response.chunk().await.map_err(LlmError::Body)?.is_some() {}

        Ok(())
    }

    async fn post(&self, prompt: &str, stream: bool) -> crate::Result<Response> {
        let request = ChatRequest::user(&self.model, prompt, stream);

        let response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await
            .map_err(LlmError::Request)?;

        let status = response.status();

        if status != StatusCode::OK {
            let body = read_bounded(response, ERROR_BODY_LIMIT).await;
            log::error!("Upstream API error ({status}): {body}");

            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

async fn read_bounded(mut response: Response, limit: usize) -> String {
    let mut body = Vec::new();

    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }

    String::from_utf8_lossy(&body).trim_end().to_string()
}
