use framing::{FrameCodec, FrameError, read_message, write_message};
use reqwest::header::HeaderMap;
use tokio_util::codec::{FramedRead, FramedWrite};
use url::Url;
use wtransport::{Connection, Endpoint, RecvStream, SendStream, endpoint::endpoint_side::Client};

/// Posts chat requests to the SSE server.
pub struct SseClient {
    url: Url,
    client: reqwest::Client,
}

pub struct SseResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl SseClient {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: bench::connect::http_client(true).unwrap(),
        }
    }

    pub async fn chat(&self, message: &str) -> SseResponse {
        self.post_raw(serde_json::json!({ "message": message }).to_string()).await
    }

    pub async fn post_raw(&self, body: impl Into<reqwest::Body>) -> SseResponse {
        let response = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();

        Self::collect(response).await
    }

    pub async fn get(&self) -> SseResponse {
        let response = self.client.get(self.url.clone()).send().await.unwrap();
        Self::collect(response).await
    }

    async fn collect(response: reqwest::Response) -> SseResponse {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap();

        SseResponse { status, headers, body }
    }
}

/// One WebTransport session.
pub struct WtClient {
    _endpoint: Endpoint<Client>,
    pub connection: Connection,
}

impl WtClient {
    pub async fn connect(url: &Url) -> anyhow::Result<Self> {
        let endpoint = bench::connect::webtransport_endpoint()?;
        let connection = bench::connect::dial_webtransport(&endpoint, url).await?;

        Ok(Self {
            _endpoint: endpoint,
            connection,
        })
    }

    pub async fn open(&self) -> WtStream {
        let (send, recv) = self.connection.open_bi().await.unwrap().await.unwrap();

        WtStream {
            reader: FramedRead::new(recv, FrameCodec::new()),
            writer: FramedWrite::new(send, FrameCodec::new()),
        }
    }
}

/// A bidirectional stream speaking the frame protocol.
pub struct WtStream {
    pub reader: FramedRead<RecvStream, FrameCodec>,
    pub writer: FramedWrite<SendStream, FrameCodec>,
}

impl WtStream {
    pub async fn send(&mut self, prompt: &str) {
        write_message(&mut self.writer, prompt).await.unwrap();
    }

    /// Half-closes the write side.
    pub async fn finish(&mut self) {
        self.writer.get_mut().finish().await.unwrap();
    }

    pub async fn read(&mut self) -> Result<String, FrameError> {
        read_message(&mut self.reader).await
    }

    /// Frames up to, not including, the empty end-of-response frame.
    pub async fn read_response(&mut self) -> Vec<String> {
        let mut tokens = Vec::new();

        loop {
            let frame = self.read().await.unwrap();

            if frame.is_empty() {
                return tokens;
            }

            tokens.push(frame);
        }
    }
}
