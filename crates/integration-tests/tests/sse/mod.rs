use std::time::Duration;

use integration_tests::{MockUpstream, TestServer};

#[tokio::test]
async fn happy_path() {
    let server = TestServer::start(MockUpstream::new().with_tokens("hi", ["hel", "lo"])).await;

    let response = server.sse_client().chat("hi").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.headers["content-type"], "text/event-stream");
    assert_eq!(response.headers["cache-control"], "no-cache");

    insta::assert_debug_snapshot!(response.body, @r#""data: hel\n\ndata: lo\n\ndata: [DONE]\n\n""#);
}

#[tokio::test]
async fn upstream_error_is_delivered_in_band() {
    let server = TestServer::start(MockUpstream::new().with_error(500, "boom")).await;

    let response = server.sse_client().chat("hi").await;

    assert_eq!(response.status, 200);
    insta::assert_debug_snapshot!(
        response.body,
        @r#""data: \n[error: upstream error (500): boom]\n\ndata: [DONE]\n\n""#
    );
}

#[tokio::test]
async fn upstream_noise_is_filtered() {
    let upstream = MockUpstream::new()
        .with_tokens("hi", ["a", "b", "c"])
        .with_noise()
        .with_usage(3, 3);

    let server = TestServer::start(upstream).await;
    let response = server.sse_client().chat("hi").await;

    insta::assert_debug_snapshot!(response.body, @r#""data: a\n\ndata: b\n\ndata: c\n\ndata: [DONE]\n\n""#);
}

#[tokio::test]
async fn exactly_one_sentinel_at_the_end() {
    let server = TestServer::start(MockUpstream::new().with_token_delay(Duration::from_millis(2))).await;

    let prompt = "streaming order matters";
    let response = server.sse_client().chat(prompt).await;

    let events: Vec<&str> = response
        .body
        .strip_suffix("\n\n")
        .unwrap()
        .split("\n\n")
        .map(|event| event.strip_prefix("data: ").unwrap())
        .collect();

    let (last, tokens) = events.split_last().unwrap();

    assert_eq!(*last, "[DONE]");
    assert!(!tokens.contains(&"[DONE]"));
    assert_eq!(tokens.concat(), prompt);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let server = TestServer::start(MockUpstream::new()).await;
    let client = server.sse_client();

    assert_eq!(client.chat("").await.status, 400);
    assert_eq!(client.post_raw(r#"{}"#).await.status, 400);
    assert_eq!(client.post_raw(r#"{"message":null}"#).await.status, 400);
    assert_eq!(client.post_raw("not json").await.status, 400);

    assert!(server.upstream.requests().is_empty());
}

#[tokio::test]
async fn only_post_is_allowed() {
    let server = TestServer::start(MockUpstream::new()).await;

    assert_eq!(server.sse_client().get().await.status, 405);
}

#[tokio::test]
async fn custom_path() {
    let config = indoc::indoc! {r#"
        [sse]
        path = "/custom"
    "#};

    let server = TestServer::start_with_config(MockUpstream::new(), config).await;
    assert!(server.sse_url().as_str().ends_with("/custom"));

    let response = server.sse_client().chat("ok").await;
    insta::assert_debug_snapshot!(response.body, @r#""data: o\n\ndata: k\n\ndata: [DONE]\n\n""#);
}
