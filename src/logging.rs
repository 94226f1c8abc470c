//! Tracing subscriber setup for hosts
//!
//! The library only emits `tracing` events; hosts that do not install a
//! subscriber of their own can call `init` once at startup. The filter comes
//! from `RUST_LOG` and defaults to `info`.

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, writing to stderr
pub fn init(format: LogFormat) -> Result<()> {
    let builder = fmt().with_env_filter(env_filter()).with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow!("failed to initialize tracing: {err}"))
}
