mod certs;
mod clients;
mod forwarder;
mod upstream;

use std::{net::SocketAddr, sync::Once};

use config::Config;
use llm::UpstreamClient;
use server::{ReverseProxy, SseServer, WebTransportServer};
use url::Url;

pub use certs::TestCertificates;
pub use clients::{SseClient, SseResponse, WtClient, WtStream};
pub use forwarder::CountingForwarder;
pub use upstream::{MockUpstream, RunningUpstream};

static INIT: Once = Once::new();

pub fn init_crypto_provider() {
    INIT.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("Failed to install default crypto provider");
    });
}

/// All three front ends on ephemeral loopback ports, wired to one mock upstream.
pub struct TestServer {
    pub config: Config,
    pub upstream: RunningUpstream,
    sse: SocketAddr,
    webtransport: SocketAddr,
    proxy: SocketAddr,
    _certs: TestCertificates,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(upstream: MockUpstream) -> Self {
        Self::start_with_config(upstream, "").await
    }

    /// Starts the servers with `config_toml` applied on top of test defaults. Listen
    /// addresses, TLS files and the upstream URL are always replaced.
    pub async fn start_with_config(upstream: MockUpstream, config_toml: &str) -> Self {
        init_crypto_provider();

        let upstream = upstream.spawn().await;
        let certs = TestCertificates::generate().await;

        let mut config: Config = toml::from_str(config_toml).unwrap();
        config.upstream.base_url = upstream.base_url().parse().unwrap();
        config.tls = certs.tls.clone();

        let loopback = SocketAddr::from(([127, 0, 0, 1], 0));
        config.webtransport.listen_address = loopback;
        config.sse.listen_address = loopback;
        config.proxy.listen_address = loopback;

        let client = UpstreamClient::new(&config.upstream).unwrap();

        let webtransport = WebTransportServer::bind(&config.webtransport, &config.tls, client.clone())
            .await
            .unwrap();
        let sse = SseServer::bind(&config.sse, &config.tls, client).await.unwrap();
        let proxy = ReverseProxy::bind(&config.proxy, &config.tls, &config.upstream)
            .await
            .unwrap();

        let addresses = (
            sse.local_addr().unwrap(),
            webtransport.local_addr().unwrap(),
            proxy.local_addr().unwrap(),
        );

        let handles = vec![
            tokio::spawn(async move { webtransport.serve().await.unwrap() }),
            tokio::spawn(async move { sse.serve().await.unwrap() }),
            tokio::spawn(async move { proxy.serve().await.unwrap() }),
        ];

        Self {
            config,
            upstream,
            sse: addresses.0,
            webtransport: addresses.1,
            proxy: addresses.2,
            _certs: certs,
            handles,
        }
    }

    pub fn sse_url(&self) -> Url {
        format!("https://127.0.0.1:{}{}", self.sse.port(), self.config.sse.path)
            .parse()
            .unwrap()
    }

    pub fn webtransport_url(&self) -> Url {
        self.webtransport_url_with_path(&self.config.webtransport.path)
    }

    pub fn webtransport_url_with_path(&self, path: &str) -> Url {
        format!("https://127.0.0.1:{}{path}", self.webtransport.port())
            .parse()
            .unwrap()
    }

    /// Base URL of the TLS reverse proxy, without a trailing slash.
    pub fn proxy_url(&self) -> String {
        format!("https://127.0.0.1:{}", self.proxy.port())
    }

    pub fn raw_completions_url(&self) -> Url {
        format!("{}/v1/chat/completions", self.proxy_url()).parse().unwrap()
    }

    pub fn sse_client(&self) -> SseClient {
        SseClient::new(self.sse_url())
    }

    pub async fn webtransport_client(&self) -> WtClient {
        WtClient::connect(&self.webtransport_url()).await.unwrap()
    }

    /// A client for the mock upstream, as the servers use it.
    pub fn upstream_client(&self) -> UpstreamClient {
        UpstreamClient::new(&self.config.upstream).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
