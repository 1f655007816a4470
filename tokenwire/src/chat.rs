//! Terminal chat clients for the two servers.

use std::io::Write;

use anyhow::Context;
use bench::{RunResult, Stopwatch, connect, millis};
use framing::{FrameCodec, read_message, write_message};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::codec::{FramedRead, FramedWrite};
use url::Url;

const BANNER: &str = "Connected. Type a message and press Enter to send. Ctrl+C to quit.";

/// Sends every prompt on one bidirectional stream of one WebTransport session.
pub(crate) async fn webtransport(url: Url) -> anyhow::Result<()> {
    let endpoint = connect::webtransport_endpoint()?;
    let connection = connect::dial_webtransport(&endpoint, &url).await?;

    let (send, recv) = connection
        .open_bi()
        .await
        .context("Failed to open stream")?
        .await
        .context("Failed to open stream")?;

    let mut writer = FramedWrite::new(send, FrameCodec::new());
    let mut reader = FramedRead::new(recv, FrameCodec::new());
    let mut input = Prompts::new();

    println!("{BANNER}");

    while let Some(prompt) = input.next().await? {
        let mut stopwatch = Stopwatch::start();
        write_message(&mut writer, &prompt).await.context("send failed")?;

        loop {
            let token = read_message(&mut reader).await.context("receive failed")?;

            if token.is_empty() {
                break;
            }

            stopwatch.token();
            print_token(&token)?;
        }

        print_stats(&stopwatch.finish(0));
    }

    connect::close_session(&connection, "client closed");

    Ok(())
}

/// Posts each prompt to the SSE endpoint and prints the `data:` events until `[DONE]`.
pub(crate) async fn sse(url: Url) -> anyhow::Result<()> {
    let client = connect::http_client(true)?;
    let mut input = Prompts::new();

    println!("{BANNER}");

    while let Some(prompt) = input.next().await? {
        let mut stopwatch = Stopwatch::start();

        let request = client
            .post(url.clone())
            .json(&serde_json::json!({ "message": prompt }))
            .send();

        let response = match request.await {
            Ok(response) => connect::expect_ok(response).await,
            Err(e) => Err(e.into()),
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                log::error!("request failed: {e:#}");
                continue;
            }
        };

        let mut lines = connect::body_lines(response);

        while let Some(line) = lines.next_line().await? {
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            if data == "[DONE]" {
                break;
            }

            stopwatch.token();
            print_token(data)?;
        }

        print_stats(&stopwatch.finish(connect::finish_body(&mut lines).await?));
    }

    Ok(())
}

struct Prompts {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompts {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next non-empty line, `None` once stdin is closed.
    async fn next(&mut self) -> anyhow::Result<Option<String>> {
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            match self.lines.next_line().await? {
                Some(line) if line.is_empty() => continue,
                line => return Ok(line),
            }
        }
    }
}

fn print_token(token: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();

    stdout.write_all(token.as_bytes())?;
    stdout.flush()?;

    Ok(())
}

fn print_stats(result: &RunResult) {
    println!();

    if result.token_count > 0 {
        println!("{}", stats_line(result));
    }
}

fn stats_line(result: &RunResult) -> String {
    format!(
        "[TTFT: {} | tokens: {} | avg TBT: {}]",
        millis(result.ttft),
        result.token_count,
        millis(result.avg_tbt())
    )
}
