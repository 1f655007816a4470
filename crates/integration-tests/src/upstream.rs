//! A scriptable OpenAI-compatible upstream.

use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Builder for the mock upstream. By default every character of the prompt comes
/// back as its own token, followed by `data: [DONE]`.
#[derive(Clone, Default)]
pub struct MockUpstream {
    responses: HashMap<String, Vec<String>>,
    error: Option<(StatusCode, String)>,
    token_delay: Option<Duration>,
    usage: Option<(u64, u64)>,
    noise: bool,
    omit_done: bool,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `prompt` with exactly these deltas.
    pub fn with_tokens<I, S>(mut self, prompt: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses
            .insert(prompt.into(), tokens.into_iter().map(Into::into).collect());
        self
    }

    /// Fails every completion with this status and body.
    pub fn with_error(mut self, status: u16, body: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.error = Some((status, body.into()));
        self
    }

    /// Sleeps before every line of the stream.
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    /// Sends a usage-only chunk before `[DONE]`.
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = Some((prompt_tokens, completion_tokens));
        self
    }

    /// Mixes comments, blank lines, role-only deltas and broken JSON into the stream.
    pub fn with_noise(mut self) -> Self {
        self.noise = true;
        self
    }

    /// Ends the body without `data: [DONE]`.
    pub fn without_done(mut self) -> Self {
        self.omit_done = true;
        self
    }

    pub async fn spawn(self) -> RunningUpstream {
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = Arc::new(UpstreamState {
            mock: self,
            requests: requests.clone(),
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .fallback(echo)
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        RunningUpstream {
            address,
            requests,
            handle,
        }
    }

    fn tokens_for(&self, prompt: &str) -> Vec<String> {
        match self.responses.get(prompt) {
            Some(tokens) => tokens.clone(),
            None => prompt.chars().map(String::from).collect(),
        }
    }

    fn stream_lines(&self, model: &str, prompt: &str) -> Vec<String> {
        let mut lines = Vec::new();

        if self.noise {
            lines.push(": keep-alive\n\n".to_string());
            lines.push(data(&chunk(model, json!({"role": "assistant", "content": ""}))));
        }

        for (i, token) in self.tokens_for(prompt).into_iter().enumerate() {
            if self.noise && i == 1 {
                lines.push("data: {not json\n\n".to_string());
                lines.push("event: ping\n\n".to_string());
            }

            lines.push(data(&chunk(model, json!({"content": token}))));
        }

        if let Some((prompt_tokens, completion_tokens)) = self.usage {
            let usage = json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "model": model,
                "choices": [],
                "usage": {
                    "prompt_tokens": prompt_tokens,
                    "completion_tokens": completion_tokens,
                    "total_tokens": prompt_tokens + completion_tokens,
                }
            });

            lines.push(data(&usage));
        }

        if !self.omit_done {
            lines.push("data: [DONE]\n\n".to_string());
        }

        lines
    }
}

fn chunk(model: &str, delta: Value) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [{"index": 0, "delta": delta, "finish_reason": null}]
    })
}

fn data(value: &Value) -> String {
    format!("data: {value}\n\n")
}

/// Handle to a running mock upstream. The server stops when this is dropped.
pub struct RunningUpstream {
    pub address: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl RunningUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Chat completion request bodies received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for RunningUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct UpstreamState {
    mock: MockUpstream,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn chat_completions(State(state): State<Arc<UpstreamState>>, Json(request): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(request.clone());

    if let Some((status, body)) = &state.mock.error {
        return (*status, body.clone()).into_response();
    }

    let model = request["model"].as_str().unwrap_or_default().to_string();
    let prompt = request["messages"][0]["content"].as_str().unwrap_or_default().to_string();

    if !request["stream"].as_bool().unwrap_or(false) {
        let content: String = state.mock.tokens_for(&prompt).concat();

        return Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        }))
        .into_response();
    }

    let lines = state.mock.stream_lines(&model, &prompt);
    let delay = state.mock.token_delay;

    let body = futures::stream::iter(lines).then(move |line| async move {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok::<_, Infallible>(Bytes::from(line))
    });

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

/// Describes any other request, so proxy tests can see what arrived.
async fn echo(request: Request) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    let mut headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter(|(name, _)| name.as_str() != "accept")
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect();

    headers.sort();

    Json(json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}
