//! Logging setup
//!
//! Console output through `tracing-subscriber`, plus an optional daily log
//! file. `RUST_LOG` wins over the configured filter.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_FILTER: &str = "expert_agency=info";

pub fn env_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or(DEFAULT_FILTER)))
}

/// Install the global subscriber. Keep the returned guard alive for as long
/// as file logging should flush.
pub fn init_logging(filter: Option<&str>, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Console logs go to stderr so they never interleave with streamed answers.
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter(filter));

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(console)
            .try_init()
            .context("failed to install tracing subscriber")?;
        return Ok(None);
    };

    std::fs::create_dir_all(dir).with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, "expert_agency.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter(filter)),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(Some(guard))
}
