use std::{fmt::Write as _, time::Duration};

use crate::RunResult;

const COLUMNS: [&str; 10] = [
    "Approach",
    "Avg Bytes",
    "P50 Bytes",
    "P90 Bytes",
    "Max Bytes",
    "Avg TTFT",
    "Avg TBT",
    "Avg Total",
    "Avg Tokens",
    "Avg B/tok",
];

/// Aggregate over the completed prompts of one runner.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub completed: usize,
    pub avg_bytes: usize,
    pub p50_bytes: usize,
    pub p90_bytes: usize,
    pub max_bytes: usize,
    pub avg_ttft: Duration,
    /// Total inter-token time over all token gaps of all prompts.
    pub avg_tbt: Duration,
    pub avg_total: Duration,
    pub avg_tokens: usize,
    pub avg_bytes_per_token: f64,
}

impl Summary {
    /// `None` when no prompt completed.
    pub fn from_results(results: &[RunResult]) -> Option<Self> {
        let completed = results.len();
        let count = u32::try_from(completed).ok().filter(|&n| n > 0)?;

        let total_bytes: usize = results.iter().map(|r| r.bytes_received).sum();
        let total_tokens: usize = results.iter().map(|r| r.token_count).sum();
        let total_ttft: Duration = results.iter().map(|r| r.ttft).sum();
        let total_inter_token: Duration = results.iter().map(|r| r.total_inter_token_time).sum();
        let total_time: Duration = results.iter().map(|r| r.total_time).sum();

        let mut sorted: Vec<usize> = results.iter().map(|r| r.bytes_received).collect();
        sorted.sort_unstable();

        let avg_tbt = match u32::try_from(total_tokens.saturating_sub(completed)) {
            Ok(gaps) if gaps > 0 => total_inter_token / gaps,
            _ => Duration::ZERO,
        };

        let avg_bytes_per_token = if total_tokens > 0 {
            total_bytes as f64 / total_tokens as f64
        } else {
            0.0
        };

        Some(Self {
            completed,
            avg_bytes: total_bytes / completed,
            p50_bytes: percentile(&sorted, 50.0),
            p90_bytes: percentile(&sorted, 90.0),
            max_bytes: sorted.last().copied().unwrap_or_default(),
            avg_ttft: total_ttft / count,
            avg_tbt,
            avg_total: total_time / count,
            avg_tokens: total_tokens / completed,
            avg_bytes_per_token,
        })
    }
}

/// Nearest-rank percentile of an ascending sample.
pub fn percentile(sorted: &[usize], p: f64) -> usize {
    if sorted.is_empty() {
        return 0;
    }

    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);

    sorted[index]
}

/// Duration rounded to the nearest millisecond, e.g. `"132ms"`.
pub fn millis(duration: Duration) -> String {
    format!("{}ms", (duration + Duration::from_micros(500)).as_millis())
}

/// Renders the comparison table, one row per runner in the given order.
pub fn render_table<'a>(rows: impl IntoIterator<Item = (&'a str, Option<&'a Summary>)>) -> String {
    let mut table = String::new();

    let _ = writeln!(table, "{}", row(COLUMNS.map(String::from)));
    let _ = writeln!(table, "{}", "-".repeat(128));

    for (name, summary) in rows {
        let cells = match summary {
            Some(s) => [
                name.to_string(),
                s.avg_bytes.to_string(),
                s.p50_bytes.to_string(),
                s.p90_bytes.to_string(),
                s.max_bytes.to_string(),
                millis(s.avg_ttft),
                millis(s.avg_tbt),
                millis(s.avg_total),
                s.avg_tokens.to_string(),
                format!("{:.1}", s.avg_bytes_per_token),
            ],
            None => std::array::from_fn(|i| if i == 0 { name.to_string() } else { "N/A".to_string() }),
        };

        let _ = writeln!(table, "{}", row(cells));
    }

    table
}

fn row(cells: [String; 10]) -> String {
    let [name, rest @ ..] = cells;
    let mut line = format!("{name:<15}");

    for cell in rest {
        let _ = write!(line, " | {cell:>10}");
    }

    line
}
