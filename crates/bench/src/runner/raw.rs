use async_trait::async_trait;
use llm::{ChatRequest, DataLine, parse_data_line};
use url::Url;

use super::Runner;
use crate::{
    RunResult, Stopwatch,
    connect::{self, body_lines, expect_ok, finish_body},
};

/// Talks OpenAI-style streaming directly to the upstream through the TLS proxy.
pub struct RawApiRunner {
    url: Url,
    model: String,
    client: Option<reqwest::Client>,
}

impl RawApiRunner {
    /// `url` is the full completions endpoint, e.g. `https://127.0.0.1:11435/v1/chat/completions`.
    pub fn new(url: Url, model: impl Into<String>, reuse: bool) -> anyhow::Result<Self> {
        let client = if reuse { Some(connect::http_client(true)?) } else { None };

        Ok(Self {
            url,
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl Runner for RawApiRunner {
    fn name(&self) -> &'static str {
        "Raw API"
    }

    async fn run(&mut self, prompt: &str) -> anyhow::Result<RunResult> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => connect::http_client(false)?,
        };

        let request = ChatRequest::user(&self.model, prompt, true);

        let mut stopwatch = Stopwatch::start();
        let response = client.post(self.url.clone()).json(&request).send().await?;
        let mut lines = body_lines(expect_ok(response).await?);

        while let Some(line) = lines.next_line().await? {
            match parse_data_line(&line) {
                DataLine::Done => break,
                DataLine::Chunk(chunk) if chunk.content().is_some() => stopwatch.token(),
                _ => (),
            }
        }

        Ok(stopwatch.finish(finish_body(&mut lines).await?))
    }
}
