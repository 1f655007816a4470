use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use config::{TlsServerConfig, WebTransportConfig};
use framing::{FrameCodec, FrameError, read_message, write_message};
use llm::{TokenSink, UpstreamClient};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use wtransport::{
    Endpoint, Identity, ServerConfig,
    endpoint::{IncomingSession, endpoint_side::Server},
};

/// WebTransport front end: one prompt per frame, tokens back as frames, an empty frame
/// after every response.
pub struct WebTransportServer {
    endpoint: Endpoint<Server>,
    shared: Arc<Shared>,
}

struct Shared {
    path: String,
    client: UpstreamClient,
}

impl WebTransportServer {
    /// Loads the TLS identity and binds the QUIC endpoint.
    pub async fn bind(config: &WebTransportConfig, tls: &TlsServerConfig, client: UpstreamClient) -> anyhow::Result<Self> {
        let identity = Identity::load_pemfiles(&tls.certificate, &tls.key)
            .await
            .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

        let server_config = ServerConfig::builder()
            .with_bind_address(config.listen_address)
            .with_identity(identity)
            .keep_alive_interval(Some(config.keep_alive_interval))
            .max_idle_timeout(Some(config.max_idle_timeout))
            .context("Invalid WebTransport idle timeout")?
            .build();

        let endpoint = Endpoint::server(server_config)
            .with_context(|| format!("Failed to bind to {}", config.listen_address))?;

        Ok(Self {
            endpoint,
            shared: Arc::new(Shared {
                path: config.path.to_string(),
                client,
            }),
        })
    }

    /// The UDP address the endpoint actually listens on.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.endpoint.local_addr().context("Failed to read WebTransport local address")
    }

    /// Accepts sessions until the process exits. Every session and every stream runs in
    /// its own task.
    pub async fn serve(self) -> anyhow::Result<()> {
        log::info!(
            "WebTransport endpoint available at: https://{}{}",
            self.local_addr()?,
            self.shared.path
        );

        loop {
            let incoming = self.endpoint.accept().await;
            tokio::spawn(handle_session(incoming, self.shared.clone()));
        }
    }
}

async fn handle_session(incoming: IncomingSession, shared: Arc<Shared>) {
    let request = match incoming.await {
        Ok(request) => request,
        Err(e) => {
            log::warn!("WebTransport handshake failed: {e}");
            return;
        }
    };

    let path = request.path().split('?').next().unwrap_or_default();

    if path != shared.path {
        log::debug!("Rejecting WebTransport session for unknown path {path}");
        request.not_found().await;
        return;
    }

    let connection = match request.accept().await {
        Ok(connection) => connection,
        Err(e) => {
            log::warn!("Failed to accept WebTransport session: {e}");
            return;
        }
    };

    let remote = connection.remote_address();
    log::info!("Accepted WebTransport session from {remote}");

    loop {
        let (send, recv) = match connection.accept_bi().await {
            Ok(streams) => streams,
            Err(e) => {
                log::debug!("WebTransport session from {remote} ended: {e}");
                break;
            }
        };

        let client = shared.client.clone();

        tokio::spawn(async move {
            let mut send = serve_stream(recv, send, &client).await;

            if let Err(e) = send.finish().await {
                log::debug!("Failed to close WebTransport stream from {remote}: {e}");
            }
        });
    }
}

/// Answers framed prompts on one stream until the client half-closes it or sends
/// something that is not a valid frame. Hands the write side back for closing.
pub(crate) async fn serve_stream<R, W>(reader: R, writer: W, client: &UpstreamClient) -> W
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut reader = FramedRead::new(reader, FrameCodec::new());
    let mut writer = FramedWrite::new(writer, FrameCodec::new());

    loop {
        let prompt = match read_message(&mut reader).await {
            Ok(prompt) => prompt,
            Err(FrameError::Eof) => break,
            Err(e) => {
                log::warn!("Failed to read prompt frame: {e}");
                break;
            }
        };

        if let Err(e) = respond(client, &prompt, &mut writer).await {
            log::debug!("Stopped writing to WebTransport stream: {e}");
            break;
        }
    }

    writer.into_inner()
}

async fn respond<W>(client: &UpstreamClient, prompt: &str, writer: &mut FramedWrite<W, FrameCodec>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut sink = FrameSink { writer };
    let (stats, result) = client.stream_chat_completion(prompt, &mut sink).await;

    crate::log_stats(prompt, &stats);

    match result {
        Ok(()) => (),
        Err(e) if e.is_sink() => return Err(e.into()),
        Err(e) => {
            log::error!("Completion failed: {e}");
            write_message(sink.writer, &crate::error_payload(&e)).await?;
        }
    }

    write_message(sink.writer, "").await?;

    Ok(())
}

struct FrameSink<'a, W> {
    writer: &'a mut FramedWrite<W, FrameCodec>,
}

#[async_trait]
impl<W> TokenSink for FrameSink<'_, W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_token(&mut self, token: &str) -> anyhow::Result<()> {
        write_message(self.writer, token).await?;
        Ok(())
    }
}
