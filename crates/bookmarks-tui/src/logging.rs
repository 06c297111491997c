//! Tracing setup: a daily log file plus the diagnostics pane.
//!
//! The terminal belongs to the UI, so nothing is written to stdout/stderr.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::diagnostics::{Diagnostic, DiagnosticsLayer};

pub const LOG_FILE_PREFIX: &str = "bookmarks.log";

/// Filter precedence: `--log-level`, then `RUST_LOG`, then the config file.
pub fn select_directive<'a>(
    cli_level: Option<&'a str>,
    env_level: Option<&'a str>,
    config_level: &'a str,
) -> &'a str {
    [cli_level, env_level]
        .into_iter()
        .flatten()
        .find(|level| !level.trim().is_empty())
        .unwrap_or(config_level)
}

/// Parses `directive`, falling back to `info` when it is malformed.
pub fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. The returned guard flushes the file
/// writer when dropped and must live until exit.
pub fn init(
    logs_dir: &Path,
    filter: EnvFilter,
    diagnostics: mpsc::UnboundedSender<Diagnostic>,
) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(DiagnosticsLayer::new(diagnostics))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
