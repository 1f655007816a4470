use std::{convert::Infallible, net::SocketAddr};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::tls_rustls::RustlsConfig;
use config::{SseConfig, TlsServerConfig};
use futures::{SinkExt, StreamExt, channel::mpsc};
use llm::{TokenSink, UpstreamClient};
use serde::Deserialize;
use tokio::net::TcpListener;

/// Events buffered between the adapter task and the response body.
const EVENT_BUFFER: usize = 16;

const DONE_EVENT: &[u8] = b"data: [DONE]\n\n";

/// HTTP/SSE front end: `POST <path>` with `{"message": ...}`, answered with one
/// `data: <token>` event per token and a final `data: [DONE]`.
pub struct SseServer {
    listener: TcpListener,
    tls: RustlsConfig,
    router: Router,
    path: String,
}

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: Option<String>,
}

impl SseServer {
    /// Loads the TLS certificate and binds the TCP listener.
    pub async fn bind(config: &SseConfig, tls: &TlsServerConfig, client: UpstreamClient) -> anyhow::Result<Self> {
        let tls = RustlsConfig::from_pem_file(&tls.certificate, &tls.key)
            .await
            .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

        let listener = TcpListener::bind(config.listen_address)
            .await
            .map_err(|e| anyhow!("Failed to bind to {}: {e}", config.listen_address))?;

        let router = Router::new().route(&config.path, post(chat)).with_state(client);

        Ok(Self {
            listener,
            tls,
            router,
            path: config.path.to_string(),
        })
    }

    /// The TCP address the listener actually bound to.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves HTTPS until the process exits.
    pub async fn serve(self) -> anyhow::Result<()> {
        log::info!("SSE endpoint available at: https://{}{}", self.local_addr()?, self.path);

        axum_server::from_tcp_rustls(self.listener.into_std()?, self.tls)
            .serve(self.router.into_make_service())
            .await
            .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))
    }
}

async fn chat(State(client): State<UpstreamClient>, body: Bytes) -> Response {
    let Some(prompt) = parse_prompt(&body) else {
        return (StatusCode::BAD_REQUEST, "message is required").into_response();
    };

    let (sender, receiver) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(stream_events(client, prompt, sender));

    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(receiver.map(Ok::<_, Infallible>)),
    )
        .into_response()
}

/// The non-empty `message` of a JSON request body.
fn parse_prompt(body: &[u8]) -> Option<String> {
    match serde_json::from_slice::<ChatBody>(body) {
        Ok(ChatBody { message: Some(message) }) if !message.is_empty() => Some(message),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Rejecting chat request body: {e}");
            None
        }
    }
}

fn event(payload: &str) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

/// Runs the completion, writing events into the response body channel. A dropped
/// body (client gone) fails the next send and stops the upstream read.
async fn stream_events(client: UpstreamClient, prompt: String, sender: mpsc::Sender<Bytes>) {
    let mut sink = EventSink { sender };
    let (stats, result) = client.stream_chat_completion(&prompt, &mut sink).await;

    crate::log_stats(&prompt, &stats);

    match result {
        Ok(()) => (),
        Err(e) if e.is_sink() => {
            log::debug!("SSE client went away: {e}");
            return;
        }
        Err(e) => {
            log::error!("Completion failed: {e}");

            if sink.sender.send(event(&crate::error_payload(&e))).await.is_err() {
                return;
            }
        }
    }

    if sink.sender.send(Bytes::from_static(DONE_EVENT)).await.is_err() {
        log::debug!("SSE client went away before the end of the response");
    }
}

struct EventSink {
    sender: mpsc::Sender<Bytes>,
}

#[async_trait]
impl TokenSink for EventSink {
    async fn send_token(&mut self, token: &str) -> anyhow::Result<()> {
        self.sender
            .send(event(token))
            .await
            .map_err(|_| anyhow!("client disconnected"))
    }
}
