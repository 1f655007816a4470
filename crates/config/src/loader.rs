use std::path::Path;

use anyhow::{Context, bail};
use indoc::indoc;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse configuration in {}", path.display()))?;

    validate(&config)?;
    log::debug!("Loaded configuration from {}", path.display());

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    if !matches!(config.upstream.base_url.scheme(), "http" | "https") {
        bail!(
            "upstream.base_url must be an http or https URL, got '{}'",
            config.upstream.base_url
        );
    }

    if config.upstream.model.trim().is_empty() {
        bail!(indoc! {r#"
            upstream.model must name the model to stream from, for example:

              [upstream]
              model = "gemma3:12b"
        "#});
    }

    for (name, path) in [("webtransport.path", &config.webtransport.path), ("sse.path", &config.sse.path)] {
        if !path.starts_with('/') {
            bail!("{name} must start with '/', got '{path}'");
        }
    }

    for (name, url) in [
        ("bench.webtransport_url", &config.bench.webtransport_url),
        ("bench.sse_url", &config.bench.sse_url),
    ] {
        if url.scheme() != "https" {
            bail!("{name} must be an https URL, got '{url}'");
        }
    }

    if config.bench.prompts.is_empty() {
        bail!("bench.prompts must contain at least one prompt");
    }

    if let Some(index) = config.bench.prompts.iter().position(|prompt| prompt.is_empty()) {
        bail!("bench.prompts[{index}] is empty");
    }

    Ok(())
}
