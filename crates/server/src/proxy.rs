use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use axum::{
    Router,
    body::{Body, HttpBody},
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use axum_server::tls_rustls::RustlsConfig;
use config::{ProxyConfig, TlsServerConfig, UpstreamConfig};
use http::{HeaderMap, HeaderName, StatusCode, header};
use tokio::net::TcpListener;

/// Headers that describe a single connection and must not be forwarded. Any
/// `proxy-*` header and any header listed in `Connection` is dropped as well.
///
/// `content-length` is kept since bodies pass through byte for byte.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// HTTPS front end that forwards every request verbatim to the plaintext upstream.
pub struct ReverseProxy {
    listener: TcpListener,
    tls: RustlsConfig,
    router: Router,
    upstream: String,
}

struct ProxyState {
    client: reqwest::Client,
    upstream: String,
}

impl ReverseProxy {
    /// Loads the TLS certificate and binds the TCP listener.
    pub async fn bind(config: &ProxyConfig, tls: &TlsServerConfig, upstream: &UpstreamConfig) -> anyhow::Result<Self> {
        let tls = RustlsConfig::from_pem_file(&tls.certificate, &tls.key)
            .await
            .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

        let listener = TcpListener::bind(config.listen_address)
            .await
            .map_err(|e| anyhow!("Failed to bind to {}: {e}", config.listen_address))?;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {e}"))?;

        let state = Arc::new(ProxyState {
            client,
            upstream: upstream.base().to_string(),
        });

        let router = Router::new().fallback(forward).with_state(state);

        Ok(Self {
            listener,
            tls,
            router,
            upstream: upstream.base().to_string(),
        })
    }

    /// The TCP address the listener actually bound to.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves HTTPS until the process exits.
    pub async fn serve(self) -> anyhow::Result<()> {
        log::info!("Proxying https://{} to {}", self.local_addr()?, self.upstream);

        axum_server::from_tcp_rustls(self.listener.into_std()?, self.tls)
            .serve(self.router.into_make_service())
            .await
            .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))
    }
}

async fn forward(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let path = parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{}{path}", state.upstream);

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    let mut upstream_request = state.client.request(parts.method, &url).headers(headers);

    if body.size_hint().exact() != Some(0) {
        upstream_request = upstream_request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream_response = match upstream_request.send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Failed to reach upstream at {url}: {e}");
            return (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response();
        }
    };

    let status = upstream_response.status();
    let mut headers = upstream_response.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    response
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let doomed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| {
            let name = name.as_str();
            HOP_BY_HOP.contains(&name) || name.starts_with("proxy-") || listed.iter().any(|l| l == name)
        })
        .cloned()
        .collect();

    for name in doomed {
        headers.remove(name);
    }
}
