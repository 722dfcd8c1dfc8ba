//! Print the router's usage ledger as JSON.
//!
//! ```text
//! websearch-router-usage [--config <path>]
//! ```
//!
//! Diagnostics go to stderr; stdout carries only the JSON document.

use std::path::PathBuf;

use anyhow::{Context, bail};
use websearch_router::engine_from_settings;
use websearch_router::logging::init_tracing;

fn parse_args() -> anyhow::Result<Option<PathBuf>> {
    let mut config = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("usage: websearch-router-usage [--config <path>]");
                std::process::exit(0);
            }
            other => bail!("unexpected argument '{other}'"),
        }
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    init_tracing("router_core=warn,websearch_router=info");

    let config_path = parse_args()?;
    let engine = engine_from_settings(config_path.as_deref(), Vec::new())
        .map_err(|e| anyhow::anyhow!("failed to load settings: {e}"))?;

    tracing::info!(state_dir = %engine.config().state_dir.display(), "reading usage ledger");
    let usage = engine.get_usage();
    println!("{}", serde_json::to_string_pretty(&usage)?);
    Ok(())
}
