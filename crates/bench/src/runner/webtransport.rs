use anyhow::Context;
use async_trait::async_trait;
use framing::{FrameCodec, read_message, write_message};
use tokio_util::codec::{FramedRead, FramedWrite};
use url::Url;
use wtransport::{Connection, Endpoint, endpoint::endpoint_side::Client};

use super::Runner;
use crate::{
    CountingReader, RunResult, Stopwatch,
    connect::{close_session, dial_webtransport, webtransport_endpoint},
};

/// Sends every prompt on its own bidirectional stream and reads frames until the empty
/// end-of-response frame.
pub struct WebTransportRunner {
    endpoint: Endpoint<Client>,
    url: Url,
    session: Option<Connection>,
}

impl WebTransportRunner {
    /// Dials once to check the server is there. With `reuse` that session serves every
    /// prompt, otherwise it is closed and each prompt dials its own.
    pub async fn connect(url: Url, reuse: bool) -> anyhow::Result<Self> {
        let endpoint = webtransport_endpoint()?;
        let session = dial_webtransport(&endpoint, &url).await?;

        let session = if reuse {
            Some(session)
        } else {
            close_session(&session, "connectivity check");
            None
        };

        Ok(Self { endpoint, url, session })
    }
}

#[async_trait]
impl Runner for WebTransportRunner {
    fn name(&self) -> &'static str {
        "WebTransport"
    }

    async fn run(&mut self, prompt: &str) -> anyhow::Result<RunResult> {
        let mut stopwatch = Stopwatch::start();

        let fresh;
        let session = match &self.session {
            Some(session) => session,
            None => {
                fresh = dial_webtransport(&self.endpoint, &self.url).await?;
                &fresh
            }
        };

        let (send, recv) = session
            .open_bi()
            .await
            .context("open stream")?
            .await
            .context("open stream")?;

        let mut writer = FramedWrite::new(send, FrameCodec::new());
        write_message(&mut writer, prompt).await.context("write prompt")?;

        // Half-close so the server sees the prompt is complete.
        let mut send = writer.into_inner();
        send.finish().await.context("close write")?;

        let mut reader = FramedRead::new(CountingReader::new(recv), FrameCodec::new());

        loop {
            let frame = read_message(&mut reader).await.context("read token")?;

            if frame.is_empty() {
                break;
            }

            stopwatch.token();
        }

        let result = stopwatch.finish(reader.get_ref().bytes());

        if self.session.is_none() {
            close_session(session, "prompt done");
        }

        Ok(result)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(session) = self.session.take() {
            close_session(&session, "benchmark done");
        }

        Ok(())
    }
}
