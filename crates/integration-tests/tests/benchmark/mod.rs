use bench::{RawApiRunner, Report, Runner, SseRunner, Targets, WebTransportRunner};
use integration_tests::{CountingForwarder, MockUpstream, TestServer};
use url::Url;

fn prompts() -> Vec<String> {
    ["ping", "hello there"].map(String::from).to_vec()
}

fn targets(server: &TestServer, reuse: bool) -> Targets {
    Targets {
        raw_url: server.raw_completions_url(),
        model: server.config.upstream.model.clone(),
        sse_url: server.sse_url(),
        webtransport_url: server.webtransport_url(),
        reuse,
    }
}

async fn run(server: &TestServer, reuse: bool) -> Vec<Report> {
    let runners = bench::runners(&targets(server, reuse)).await.unwrap();
    let mut out = Vec::new();

    bench::run(runners, &prompts(), &mut out).await.unwrap()
}

fn assert_complete(reports: &[Report]) {
    let names: Vec<_> = reports.iter().map(|report| report.name).collect();
    assert_eq!(names, ["Raw API", "HTTP SSE", "WebTransport"]);

    for report in reports {
        let tokens: Vec<_> = report.results.iter().map(|result| result.token_count).collect();
        assert_eq!(tokens, [4, 11], "{}", report.name);

        for result in &report.results {
            assert!(result.bytes_received > 0, "{}", report.name);
            assert!(result.ttft <= result.total_time, "{}", report.name);
            assert!(result.total_inter_token_time <= result.total_time, "{}", report.name);
        }
    }
}

#[tokio::test]
async fn fresh_connections() {
    let server = TestServer::start(MockUpstream::new().with_noise()).await;

    assert_complete(&run(&server, false).await);
}

#[tokio::test]
async fn reused_connections() {
    let server = TestServer::start(MockUpstream::new().with_noise()).await;

    assert_complete(&run(&server, true).await);
}

#[tokio::test]
async fn framing_is_the_most_compact() {
    let server = TestServer::start(MockUpstream::new()).await;
    let reports = run(&server, true).await;

    let bytes: Vec<_> = reports.iter().map(|report| report.summary().unwrap().avg_bytes).collect();

    // Raw upstream JSON > SSE events > length-prefixed frames.
    assert!(bytes[0] > bytes[1], "{bytes:?}");
    assert!(bytes[1] > bytes[2], "{bytes:?}");
}

#[tokio::test]
async fn webtransport_frames_are_counted_exactly() {
    let server = TestServer::start(MockUpstream::new()).await;

    let mut runner = WebTransportRunner::connect(server.webtransport_url(), true).await.unwrap();
    let result = runner.run("ping").await.unwrap();
    runner.close().await.unwrap();

    // "1:p" "1:o" "1:n" "1:g" "0:"
    assert_eq!(result.token_count, 4);
    assert_eq!(result.bytes_received, 4 * 3 + 2);
}

#[tokio::test]
async fn sse_events_are_counted_exactly() {
    let server = TestServer::start(MockUpstream::new().with_tokens("hi", ["hel", "lo"])).await;

    let mut runner = SseRunner::new(server.sse_url(), false).unwrap();
    let result = runner.run("hi").await.unwrap();

    assert_eq!(result.token_count, 2);
    assert_eq!(result.bytes_received, "data: hel\n\ndata: lo\n\ndata: [DONE]\n\n".len());
}

#[tokio::test]
async fn non_ok_status_fails_the_prompt() {
    let server = TestServer::start(MockUpstream::new().with_error(500, "boom")).await;

    let mut runner = RawApiRunner::new(server.raw_completions_url(), "gemma3:12b", false).unwrap();
    let error = runner.run("hi").await.unwrap_err();

    insta::assert_snapshot!(error, @"unexpected status 500 Internal Server Error: boom");
}

#[tokio::test]
async fn failed_runner_is_reported_as_not_available() {
    let server = TestServer::start(MockUpstream::new().with_error(500, "boom")).await;

    let runners: Vec<Box<dyn Runner>> = vec![Box::new(
        RawApiRunner::new(server.raw_completions_url(), "gemma3:12b", false).unwrap(),
    )];

    let mut out = Vec::new();
    let reports = bench::run(runners, &prompts(), &mut out).await.unwrap();

    assert!(reports[0].results.is_empty());

    let table = bench::summary_table(&reports);
    insta::assert_snapshot!(table.lines().last().unwrap(), @"Raw API         |        N/A |        N/A |        N/A |        N/A |        N/A |        N/A |        N/A |        N/A |        N/A");
}

#[tokio::test]
async fn unreachable_webtransport_is_left_out() {
    let server = TestServer::start(MockUpstream::new()).await;

    let mut targets = targets(&server, false);
    targets.webtransport_url = Url::parse("https://127.0.0.1:1/wt").unwrap();

    let runners = bench::runners(&targets).await.unwrap();
    let names: Vec<_> = runners.iter().map(|runner| runner.name()).collect();

    assert_eq!(names, ["Raw API", "HTTP SSE"]);
}

/// Runs five prompts through the SSE and raw runners, each behind its own forwarder,
/// and returns how many TCP connections each of them opened.
async fn http_connections(reuse: bool) -> (usize, usize) {
    let server = TestServer::start(MockUpstream::new().with_noise()).await;

    let sse = CountingForwarder::start(&server.sse_url()).await;
    let proxy = CountingForwarder::start(&server.raw_completions_url()).await;

    let mut runners: Vec<Box<dyn Runner>> = vec![
        Box::new(SseRunner::new(sse.url_for(&server.sse_url()), reuse).unwrap()),
        Box::new(
            RawApiRunner::new(
                proxy.url_for(&server.raw_completions_url()),
                &server.config.upstream.model,
                reuse,
            )
            .unwrap(),
        ),
    ];

    for runner in &mut runners {
        for prompt in ["one", "two", "three", "four", "five"] {
            let result = runner.run(prompt).await.unwrap();
            assert_eq!(result.token_count, prompt.len(), "{}", runner.name());
        }
    }

    (sse.accepted(), proxy.accepted())
}

#[tokio::test]
async fn reuse_mode_keeps_a_single_http_connection() {
    assert_eq!(http_connections(true).await, (1, 1));
}

#[tokio::test]
async fn fresh_mode_connects_once_per_prompt() {
    assert_eq!(http_connections(false).await, (5, 5));
}
