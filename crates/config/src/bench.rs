//! Benchmark configuration.

use serde::Deserialize;
use url::Url;

/// Prompts used when the configuration does not list its own.
pub const DEFAULT_PROMPTS: &[&str] = &[
    "What is the capital of France?",
    "Explain the difference between a stack and a queue.",
    "Write a haiku about programming.",
    "What are the first 10 prime numbers?",
    "Explain how a hash table works in simple terms.",
    "Write a short Rust function that reverses a string.",
    "What causes a rainbow to appear?",
    "Compare TCP and UDP in three sentences.",
    "What is the time complexity of binary search and why?",
    "Describe the observer design pattern briefly.",
];

/// Settings for the comparative benchmark.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Keep one connection (or session) per runner instead of dialing per prompt.
    pub reuse: bool,
    /// WebTransport endpoint of the token server.
    pub webtransport_url: Url,
    /// Chat endpoint of the HTTP/SSE server.
    pub sse_url: Url,
    /// Prompts sent, in order, through every runner.
    pub prompts: Vec<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            reuse: false,
            webtransport_url: Url::parse("https://localhost:4433/wt").expect("static URL is valid"),
            sse_url: Url::parse("https://localhost:8080/chat").expect("static URL is valid"),
            prompts: DEFAULT_PROMPTS.iter().map(|prompt| prompt.to_string()).collect(),
        }
    }
}
