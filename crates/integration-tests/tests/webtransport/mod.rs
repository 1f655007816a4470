use std::time::Duration;

use framing::MAX_FRAME_LEN;
use integration_tests::{MockUpstream, TestServer, WtClient};

#[tokio::test]
async fn happy_path() {
    let server = TestServer::start(MockUpstream::new().with_tokens("ping", ["p", "o", "n", "g"])).await;
    let client = server.webtransport_client().await;

    let mut stream = client.open().await;
    stream.send("ping").await;
    stream.finish().await;

    assert_eq!(stream.read_response().await, ["p", "o", "n", "g"]);
    assert!(stream.read().await.unwrap_err().is_eof());
}

#[tokio::test]
async fn upstream_error_is_delivered_in_band() {
    let server = TestServer::start(MockUpstream::new().with_error(500, "boom")).await;
    let client = server.webtransport_client().await;

    let mut stream = client.open().await;
    stream.send("ping").await;
    stream.finish().await;

    insta::assert_debug_snapshot!(stream.read_response().await, @r#"
    [
        "\n[error: upstream error (500): boom]",
    ]
    "#);
}

#[tokio::test]
async fn several_prompts_on_one_stream() {
    let server = TestServer::start(MockUpstream::new().with_tokens("second", ["2nd"])).await;
    let client = server.webtransport_client().await;

    let mut stream = client.open().await;

    stream.send("ab").await;
    assert_eq!(stream.read_response().await, ["a", "b"]);

    stream.send("second").await;
    assert_eq!(stream.read_response().await, ["2nd"]);

    stream.finish().await;
    assert!(stream.read().await.unwrap_err().is_eof());
}

#[tokio::test]
async fn empty_prompt_is_forwarded() {
    let server = TestServer::start(MockUpstream::new()).await;
    let client = server.webtransport_client().await;

    let mut stream = client.open().await;
    stream.send("").await;
    stream.finish().await;

    assert!(stream.read_response().await.is_empty());
    assert_eq!(server.upstream.requests()[0]["messages"][0]["content"], "");
}

#[tokio::test]
async fn oversize_frame_closes_the_stream() {
    let server = TestServer::start(MockUpstream::new()).await;
    let client = server.webtransport_client().await;

    let mut stream = client.open().await;

    let send = stream.writer.get_mut();
    send.write_all(format!("{}:", MAX_FRAME_LEN + 1).as_bytes()).await.unwrap();

    // The server may stop reading before the payload is through.
    let _ = send.write_all(&vec![b'x'; MAX_FRAME_LEN + 1]).await;
    let _ = send.finish().await;

    assert!(stream.read().await.unwrap_err().is_eof());
    assert!(server.upstream.requests().is_empty());
}

#[tokio::test]
async fn bad_prefix_closes_the_stream() {
    let server = TestServer::start(MockUpstream::new()).await;
    let client = server.webtransport_client().await;

    let mut stream = client.open().await;
    stream.writer.get_mut().write_all(b"abc:hello").await.unwrap();
    stream.finish().await;

    assert!(stream.read().await.unwrap_err().is_eof());
}

#[tokio::test]
async fn concurrent_streams_do_not_interleave() {
    let upstream = MockUpstream::new()
        .with_tokens("left", ["l1", "l2", "l3", "l4"])
        .with_tokens("right", ["r1", "r2", "r3", "r4"])
        .with_token_delay(Duration::from_millis(5));

    let server = TestServer::start(upstream).await;
    let client = server.webtransport_client().await;

    let mut left = client.open().await;
    let mut right = client.open().await;

    left.send("left").await;
    right.send("right").await;
    left.finish().await;
    right.finish().await;

    let (left, right) = tokio::join!(left.read_response(), right.read_response());

    assert_eq!(left, ["l1", "l2", "l3", "l4"]);
    assert_eq!(right, ["r1", "r2", "r3", "r4"]);
}

#[tokio::test]
async fn many_sessions() {
    let server = TestServer::start(MockUpstream::new()).await;

    let mut sessions = Vec::new();

    for prompt in ["one", "two", "three"] {
        let client = server.webtransport_client().await;
        sessions.push(async move {
            let mut stream = client.open().await;
            stream.send(prompt).await;
            stream.finish().await;
            stream.read_response().await.concat()
        });
    }

    let answers = futures::future::join_all(sessions).await;
    assert_eq!(answers, ["one", "two", "three"]);
}

#[tokio::test]
async fn unknown_path_is_rejected() {
    let server = TestServer::start(MockUpstream::new()).await;

    let result = WtClient::connect(&server.webtransport_url_with_path("/nope")).await;
    assert!(result.is_err());
}
