use config::{ProxyConfig, UpstreamConfig};
use integration_tests::{MockUpstream, TestCertificates, TestServer, init_crypto_provider};
use serde_json::Value;
use server::ReverseProxy;

fn client() -> reqwest::Client {
    reqwest::Client::builder().danger_accept_invalid_certs(true).build().unwrap()
}

#[tokio::test]
async fn streams_completions_over_tls() {
    let server = TestServer::start(MockUpstream::new().with_tokens("hi", ["hel", "lo"])).await;

    let response = client()
        .post(server.raw_completions_url())
        .json(&serde_json::json!({
            "model": "gemma3:12b",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/event-stream");

    let body = response.text().await.unwrap();
    let lines: Vec<&str> = body.lines().filter(|line| !line.is_empty()).collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(r#""content":"hel""#));
    assert!(lines[1].contains(r#""content":"lo""#));
    assert_eq!(lines[2], "data: [DONE]");

    assert_eq!(server.upstream.requests().len(), 1);
}

#[tokio::test]
async fn forwards_method_path_query_and_headers() {
    let server = TestServer::start(MockUpstream::new()).await;

    let response = client()
        .put(format!("{}/v1/anything?limit=5&x=y", server.proxy_url()))
        .header("x-custom", "kept")
        .header("proxy-authorization", "Basic c2VjcmV0")
        .header("connection", "x-session")
        .header("x-session", "dropped")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let echo: Value = response.json().await.unwrap();

    assert_eq!(echo["method"], "PUT");
    assert_eq!(echo["uri"], "/v1/anything?limit=5&x=y");
    assert_eq!(echo["body"], "payload");

    let content_length = echo["headers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|pair| pair[0] == "content-length")
        .map(|pair| pair[1].clone());
    assert_eq!(content_length, Some(Value::from("7")));

    let headers: Vec<String> = echo["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| pair[0].as_str().unwrap().to_string())
        .collect();

    assert!(headers.contains(&"x-custom".to_string()));
    assert!(!headers.contains(&"transfer-encoding".to_string()));
    assert!(!headers.contains(&"proxy-authorization".to_string()));
    assert!(!headers.contains(&"x-session".to_string()));
}

#[tokio::test]
async fn upstream_errors_pass_through() {
    let server = TestServer::start(MockUpstream::new().with_error(503, "model loading")).await;

    let response = client()
        .post(server.raw_completions_url())
        .json(&serde_json::json!({"model": "m", "messages": [], "stream": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.unwrap(), "model loading");
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    init_crypto_provider();
    let certs = TestCertificates::generate().await;

    let config = ProxyConfig {
        listen_address: "127.0.0.1:0".parse().unwrap(),
    };
    let upstream: UpstreamConfig = toml::from_str(r#"base_url = "http://127.0.0.1:1""#).unwrap();

    let proxy = ReverseProxy::bind(&config, &certs.tls, &upstream).await.unwrap();
    let address = proxy.local_addr().unwrap();
    let handle = tokio::spawn(proxy.serve());

    let response = client()
        .get(format!("https://127.0.0.1:{}/v1/models", address.port()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);

    handle.abort();
}
