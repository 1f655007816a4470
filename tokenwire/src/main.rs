use std::io::Write;

use anyhow::Context;
use args::{Args, Command};
use bench::Targets;
use clap::Parser;
use config::Config;
use llm::UpstreamClient;
use server::{ReverseProxy, SseServer, WebTransportServer};

mod args;
mod chat;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    logger::init(&args);

    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
        log::debug!("A rustls crypto provider is already installed");
    }

    let result = match args.command {
        Command::Webtransport => webtransport(&config).await,
        Command::Sse => sse(&config).await,
        Command::Proxy => proxy(&config).await,
        Command::Bench { reuse } => benchmark(&config, reuse || config.bench.reuse).await,
        Command::ChatWt { url } => chat::webtransport(url.unwrap_or_else(|| config.bench.webtransport_url.clone())).await,
        Command::ChatSse { url } => chat::sse(url.unwrap_or_else(|| config.bench.sse_url.clone())).await,
    };

    if let Err(e) = result {
        log::error!("{e:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn webtransport(config: &Config) -> anyhow::Result<()> {
    let client = UpstreamClient::new(&config.upstream)?;

    WebTransportServer::bind(&config.webtransport, &config.tls, client)
        .await?
        .serve()
        .await
}

async fn sse(config: &Config) -> anyhow::Result<()> {
    let client = UpstreamClient::new(&config.upstream)?;

    SseServer::bind(&config.sse, &config.tls, client).await?.serve().await
}

async fn proxy(config: &Config) -> anyhow::Result<()> {
    ReverseProxy::bind(&config.proxy, &config.tls, &config.upstream)
        .await?
        .serve()
        .await
}

/// Runs every prompt against the raw upstream (through an in-process TLS proxy), the
/// SSE server and the WebTransport server, then prints the comparison table.
async fn benchmark(config: &Config, reuse: bool) -> anyhow::Result<()> {
    let proxy = ReverseProxy::bind(&config.proxy, &config.tls, &config.upstream)
        .await
        .context("could not start TLS proxy")?;
    let proxy_addr = proxy.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = proxy.serve().await {
            log::error!("TLS proxy stopped: {e:#}");
        }
    });

    let mut stdout = std::io::stdout();

    writeln!(stdout, "TLS proxy to upstream listening on {proxy_addr}")?;

    if reuse {
        writeln!(stdout, "Mode: connection reuse (persistent connections)")?;
    } else {
        writeln!(stdout, "Mode: fresh connection per prompt")?;
    }

    write!(stdout, "Warming up upstream model... ")?;
    stdout.flush()?;

    match UpstreamClient::new(&config.upstream)?.warm_up().await {
        Ok(()) => writeln!(stdout, "done")?,
        Err(e) => writeln!(stdout, "warning: warmup failed: {e}")?,
    }

    let targets = Targets {
        raw_url: format!("https://127.0.0.1:{}/v1/chat/completions", proxy_addr.port()).parse()?,
        model: config.upstream.model.clone(),
        sse_url: config.bench.sse_url.clone(),
        webtransport_url: config.bench.webtransport_url.clone(),
        reuse,
    };

    let runners = bench::runners(&targets).await?;
    let reports = bench::run(runners, &config.bench.prompts, &mut stdout).await?;

    writeln!(stdout, "\n{}", bench::summary_table(&reports))?;

    Ok(())
}
