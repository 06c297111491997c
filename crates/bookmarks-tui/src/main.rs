use std::path::PathBuf;

use anyhow::{Context, Result};
use bookmarks_infrastructure::{BookmarkPaths, ConfigStorage};
use clap::Parser;
use tokio::sync::mpsc;

mod app;
mod bootstrap;
mod diagnostics;
mod logging;
mod terminal;
mod ui;

#[derive(Parser)]
#[command(name = "bookmarks")]
#[command(about = "Bookmarks - your Supabase-backed bookmarks in the terminal", long_about = None)]
struct Cli {
    /// Config file to use instead of the per-user one
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run against an in-memory backend with sample data
    #[arg(long)]
    demo: bool,

    /// Log filter directive; overrides RUST_LOG and the config file
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match &cli.config {
        Some(file) => BookmarkPaths::with_config_file(file),
        None => BookmarkPaths::resolve()?,
    };
    paths
        .ensure_dirs()
        .with_context(|| format!("Failed to create {}", paths.config_dir().display()))?;

    let config = ConfigStorage::new(paths.config_file().to_path_buf()).load()?;

    let env_level = std::env::var("RUST_LOG").ok();
    let directive = logging::select_directive(
        cli.log_level.as_deref(),
        env_level.as_deref(),
        &config.logging.level,
    );
    let (diagnostics_tx, diagnostics_rx) = mpsc::unbounded_channel();
    let _log_guard = logging::init(
        &paths.logs_dir(),
        logging::build_filter(directive),
        diagnostics_tx,
    )?;
    tracing::info!(
        "[Main] Starting with config {} (demo: {})",
        paths.config_file().display(),
        cli.demo
    );

    let bootstrap = if cli.demo {
        bootstrap::demo(&config)
    } else {
        bootstrap::hosted(&config, &paths)?
    };

    app::run(bootstrap.view_model, diagnostics_rx).await
}
