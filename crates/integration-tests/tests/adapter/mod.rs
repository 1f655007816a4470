use async_trait::async_trait;
use integration_tests::MockUpstream;
use llm::{LlmError, Stats, TokenSink, UpstreamClient};
use serde_json::json;

#[derive(Default)]
struct Collect {
    tokens: Vec<String>,
    fail_after: Option<usize>,
}

#[async_trait]
impl TokenSink for Collect {
    async fn send_token(&mut self, token: &str) -> anyhow::Result<()> {
        if self.fail_after == Some(self.tokens.len()) {
            anyhow::bail!("stream closed by client");
        }

        self.tokens.push(token.to_string());
        Ok(())
    }
}

fn client(base_url: &str) -> UpstreamClient {
    UpstreamClient::with_client(reqwest::Client::new(), base_url, "gemma3:12b")
}

#[tokio::test]
async fn tokens_arrive_in_upstream_order() {
    let upstream = MockUpstream::new()
        .with_tokens("hi", ["hel", "lo"])
        .with_usage(9, 2)
        .with_noise()
        .spawn()
        .await;

    let mut sink = Collect::default();
    let (stats, result) = client(&upstream.base_url()).stream_chat_completion("hi", &mut sink).await;

    result.unwrap();
    assert_eq!(sink.tokens, ["hel", "lo"]);
    assert_eq!(stats.bytes_sent, 5);
    assert_eq!((stats.prompt_tokens, stats.completion_tokens), (9, 2));

    // Only the two content lines count, each with its newline.
    let line = |token: &str| {
        format!(
            "data: {}",
            json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "model": "gemma3:12b",
                "choices": [{"index": 0, "delta": {"content": token}, "finish_reason": null}]
            })
        )
        .len()
            + 1
    };
    assert_eq!(stats.bytes_received, line("hel") + line("lo"));
}

#[tokio::test]
async fn request_body() {
    let upstream = MockUpstream::new().spawn().await;

    let mut sink = Collect::default();
    let (_, result) = client(&upstream.base_url())
        .stream_chat_completion("What is the capital of France?", &mut sink)
        .await;
    result.unwrap();

    assert_eq!(
        upstream.requests(),
        [json!({
            "model": "gemma3:12b",
            "messages": [{"role": "user", "content": "What is the capital of France?"}],
            "stream": true,
        })]
    );
}

#[tokio::test]
async fn done_without_content_yields_zero_stats() {
    let upstream = MockUpstream::new().with_tokens("quiet", Vec::<String>::new()).spawn().await;

    let mut sink = Collect::default();
    let (stats, result) = client(&upstream.base_url()).stream_chat_completion("quiet", &mut sink).await;

    result.unwrap();
    assert!(sink.tokens.is_empty());
    assert_eq!(stats, Stats::default());
}

#[tokio::test]
async fn done_marker_is_not_required() {
    let upstream = MockUpstream::new().without_done().spawn().await;

    let mut sink = Collect::default();
    let (_, result) = client(&upstream.base_url()).stream_chat_completion("abc", &mut sink).await;

    result.unwrap();
    assert_eq!(sink.tokens, ["a", "b", "c"]);
}

#[tokio::test]
async fn upstream_error_carries_status_and_body() {
    let upstream = MockUpstream::new().with_error(500, "boom").spawn().await;

    let mut sink = Collect::default();
    let (stats, result) = client(&upstream.base_url()).stream_chat_completion("hi", &mut sink).await;

    let error = result.unwrap_err();
    assert!(matches!(error, LlmError::Upstream { status: 500, .. }));
    insta::assert_snapshot!(error, @"upstream error (500): boom");

    assert!(sink.tokens.is_empty());
    assert_eq!(stats, Stats::default());
}

#[tokio::test]
async fn unreachable_upstream_fails_immediately() {
    let mut sink = Collect::default();
    let (_, result) = client("http://127.0.0.1:1").stream_chat_completion("hi", &mut sink).await;

    assert!(matches!(result.unwrap_err(), LlmError::Request(_)));
}

#[tokio::test]
async fn sink_failure_aborts_the_stream() {
    let upstream = MockUpstream::new().spawn().await;

    let mut sink = Collect {
        fail_after: Some(2),
        ..Default::default()
    };
    let (stats, result) = client(&upstream.base_url()).stream_chat_completion("abcdef", &mut sink).await;

    assert!(result.unwrap_err().is_sink());
    assert_eq!(sink.tokens, ["a", "b"]);
    assert_eq!(stats.bytes_sent, 3);
}

#[tokio::test]
async fn warm_up_is_not_streamed() {
    let upstream = MockUpstream::new().spawn().await;

    client(&upstream.base_url()).warm_up().await.unwrap();

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["stream"], false);
}

#[tokio::test]
async fn concatenated_tokens_equal_upstream_content() {
    let prompt = "The quick brown fox jumps over the lazy dog. Ünïcödé ✓";
    let upstream = MockUpstream::new().spawn().await;

    let mut sink = Collect::default();
    let (stats, result) = client(&upstream.base_url()).stream_chat_completion(prompt, &mut sink).await;

    result.unwrap();
    assert_eq!(sink.tokens.concat(), prompt);
    assert_eq!(stats.bytes_sent, prompt.len());
}
