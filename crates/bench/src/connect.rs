//! Client construction shared by the runners and the example REPLs.

use std::{io, time::Duration};

use anyhow::{Context, anyhow, bail};
use bytes::Bytes;
use futures::{TryStreamExt, stream::BoxStream};
use reqwest::{Response, StatusCode};
use tokio::io::{BufReader, Lines};
use tokio_util::io::StreamReader;
use url::Url;
use wtransport::{ClientConfig, Connection, Endpoint, VarInt, endpoint::endpoint_side::Client};

use crate::CountingReader;

/// How long a WebTransport dial may take before the server counts as unreachable.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Line reader over an HTTP response body that counts the wire bytes it consumes.
pub type BodyLines = Lines<BufReader<CountingReader<StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>>>>;

/// HTTPS client trusting any certificate, HTTP/1.1 only.
///
/// Without `reuse` no idle connection is kept, so every request pays a fresh TCP and
/// TLS handshake.
pub fn http_client(reuse: bool) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .http1_only()
        .danger_accept_invalid_certs(true);

    if !reuse {
        builder = builder.pool_max_idle_per_host(0);
    }

    builder.build().context("Failed to create HTTP client")
}

/// Fails on anything but `200 OK`.
pub async fn expect_ok(response: Response) -> anyhow::Result<Response> {
    let status = response.status();

    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        bail!("unexpected status {status}: {}", body.trim_end());
    }

    Ok(response)
}

pub fn body_lines(response: Response) -> BodyLines {
    use tokio::io::AsyncBufReadExt;

    let stream: BoxStream<'static, io::Result<Bytes>> = Box::pin(response.bytes_stream().map_err(io::Error::other));

    BufReader::new(CountingReader::new(StreamReader::new(stream))).lines()
}

/// Bytes the body reader has pulled off the wire.
fn body_bytes(lines: &mut BodyLines) -> usize {
    lines.get_mut().get_ref().bytes()
}

/// Reads the body to its end, so the connection goes back to the pool instead of
/// being torn down, and returns the bytes read.
pub async fn finish_body(lines: &mut BodyLines) -> io::Result<usize> {
    while lines.next_line().await?.is_some() {}

    Ok(body_bytes(lines))
}

/// QUIC client endpoint that skips certificate validation.
pub fn webtransport_endpoint() -> anyhow::Result<Endpoint<Client>> {
    let config = ClientConfig::builder()
        .with_bind_default()
        .with_no_cert_validation()
        .keep_alive_interval(Some(Duration::from_secs(30)))
        .max_idle_timeout(Some(Duration::from_secs(5 * 60)))
        .context("Invalid WebTransport idle timeout")?
        .build();

    Endpoint::client(config).context("Failed to create WebTransport client endpoint")
}

/// Opens a WebTransport session to `url`.
pub async fn dial_webtransport(endpoint: &Endpoint<Client>, url: &Url) -> anyhow::Result<Connection> {
    tokio::time::timeout(DIAL_TIMEOUT, endpoint.connect(url.as_str()))
        .await
        .map_err(|_| anyhow!("webtransport dial {url}: timed out after {}s", DIAL_TIMEOUT.as_secs()))?
        .with_context(|| format!("webtransport dial {url}"))
}

pub fn close_session(connection: &Connection, reason: &str) {
    connection.close(VarInt::from_u32(0), reason.as_bytes());
}
