mod raw;
mod sse;
mod webtransport;

use async_trait::async_trait;

pub use raw::RawApiRunner;
pub use sse::SseRunner;
pub use webtransport::WebTransportRunner;

use crate::RunResult;

/// One way of getting a prompt answered, measured end to end.
#[async_trait]
pub trait Runner: Send {
    fn name(&self) -> &'static str;

    /// Sends `prompt` and reads the whole response.
    async fn run(&mut self, prompt: &str) -> anyhow::Result<RunResult>;

    /// Releases long-lived connections.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
