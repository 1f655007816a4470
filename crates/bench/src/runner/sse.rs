use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use super::Runner;
use crate::{
    RunResult, Stopwatch,
    connect::{self, body_lines, expect_ok, finish_body},
};

const DATA_PREFIX: &str = "data: ";
const DONE: &str = "[DONE]";

#[derive(Serialize)]
struct ChatBody<'a> {
    message: &'a str,
}

/// Posts to the HTTP/SSE server and counts `data:` events until `[DONE]`.
pub struct SseRunner {
    url: Url,
    client: Option<reqwest::Client>,
}

impl SseRunner {
    pub fn new(url: Url, reuse: bool) -> anyhow::Result<Self> {
        let client = if reuse { Some(connect::http_client(true)?) } else { None };
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Runner for SseRunner {
    fn name(&self) -> &'static str {
        "HTTP SSE"
    }

    async fn run(&mut self, prompt: &str) -> anyhow::Result<RunResult> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => connect::http_client(false)?,
        };

        let mut stopwatch = Stopwatch::start();
        let response = client
            .post(self.url.clone())
            .json(&ChatBody { message: prompt })
            .send()
            .await?;
        let mut lines = body_lines(expect_ok(response).await?);

        while let Some(line) = lines.next_line().await? {
            let Some(data) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };

            if data == DONE {
                break;
            }

            stopwatch.token();
        }

        Ok(stopwatch.finish(finish_body(&mut lines).await?))
    }
}
