//! Side-by-side benchmark of the three streaming transports.
//!
//! Every runner gets the same prompts, one after another. Per prompt the harness records
//! bytes on the wire, time to first token, the gaps between tokens and the total time;
//! at the end it prints one summary row per runner.

pub mod connect;
mod measure;
mod runner;
mod summary;

use std::io::Write;

use url::Url;

pub use measure::{CountingReader, RunResult, Stopwatch};
pub use runner::{RawApiRunner, Runner, SseRunner, WebTransportRunner};
pub use summary::{Summary, millis, percentile, render_table};

/// Where the runners send their prompts.
#[derive(Debug, Clone)]
pub struct Targets {
    /// Completions endpoint behind the TLS proxy.
    pub raw_url: Url,
    pub model: String,
    pub sse_url: Url,
    pub webtransport_url: Url,
    /// Keep one connection (or session) per runner instead of one per prompt.
    pub reuse: bool,
}

/// Completed measurements of one runner.
#[derive(Debug, Clone)]
pub struct Report {
    pub name: &'static str,
    pub results: Vec<RunResult>,
}

impl Report {
    pub fn summary(&self) -> Option<Summary> {
        Summary::from_results(&self.results)
    }
}

/// Raw API, HTTP SSE and, when a session can be established, WebTransport.
pub async fn runners(targets: &Targets) -> anyhow::Result<Vec<Box<dyn Runner>>> {
    let mut runners: Vec<Box<dyn Runner>> = vec![
        Box::new(RawApiRunner::new(targets.raw_url.clone(), &targets.model, targets.reuse)?),
        Box::new(SseRunner::new(targets.sse_url.clone(), targets.reuse)?),
    ];

    match WebTransportRunner::connect(targets.webtransport_url.clone(), targets.reuse).await {
        Ok(runner) => runners.push(Box::new(runner)),
        Err(e) => log::warn!("WebTransport unavailable, skipping it: {e:#}"),
    }

    Ok(runners)
}

/// Runs every prompt through every runner in order, writing a progress line per prompt
/// to `out`. A failed prompt is reported and skipped.
pub async fn run<W: Write>(runners: Vec<Box<dyn Runner>>, prompts: &[String], out: &mut W) -> anyhow::Result<Vec<Report>> {
    let mut reports = Vec::with_capacity(runners.len());

    for mut runner in runners {
        let name = runner.name();
        let mut results = Vec::with_capacity(prompts.len());

        writeln!(out, "\n=== {name} ===")?;

        for (i, prompt) in prompts.iter().enumerate() {
            let head: String = prompt.chars().take(40).collect();
            write!(out, "  [{}/{}] {head}... ", i + 1, prompts.len())?;
            out.flush()?;

            match runner.run(prompt).await {
                Ok(result) => {
                    writeln!(
                        out,
                        "{} tokens, TTFT {}, avg TBT {}, {} total, {} bytes, {:.1} B/tok",
                        result.token_count,
                        millis(result.ttft),
                        millis(result.avg_tbt()),
                        millis(result.total_time),
                        result.bytes_received,
                        result.bytes_per_token(),
                    )?;

                    results.push(result);
                }
                Err(e) => {
                    writeln!(out, "ERROR: {e:#}")?;
                    log::error!("{name} failed on prompt {}: {e:#}", i + 1);
                }
            }
        }

        if let Err(e) = runner.close().await {
            log::warn!("Failed to close {name} runner: {e:#}");
        }

        reports.push(Report { name, results });
    }

    Ok(reports)
}

/// The summary table for `reports`, N/A rows for runners without a completed prompt.
pub fn summary_table(reports: &[Report]) -> String {
    let summaries: Vec<_> = reports.iter().map(|report| (report.name, report.summary())).collect();

    render_table(summaries.iter().map(|(name, summary)| (*name, summary.as_ref())))
}
