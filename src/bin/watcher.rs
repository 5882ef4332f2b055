// src/bin/watcher.rs

//! Command-line watcher for document processing.
//!
//! Uploads the given files, then follows the backend's processing update
//! socket and draws one progress bar per document until interrupted (or,
//! with `--exit-when-idle`, until every document is indexed or failed).
//! Logs go to stderr, or to `--log-file` through a non-blocking appender.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};
use DocPulse::api::DocumentApi;
use DocPulse::config::cli::Args;
use DocPulse::presentation::{summary_line, ProgressBoard};
use DocPulse::tracker::ProcessingTracker;
use DocPulse::utils::common::setup_prometheus_metrics;
use DocPulse::watch_logic::{run_watch, upload_and_track};

/// Installs the global subscriber. The returned guard must live until exit
/// so buffered file logs are flushed.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")); // Default to info if RUST_LOG is not set

    match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|name| name.to_owned())
                .unwrap_or_else(|| "watcher.log".into());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_file.as_deref());

    let config = args
        .resolve_config()
        .context("Failed to load tracker configuration")?;
    if args.validate_config {
        info!("Configuration is valid.");
        return Ok(());
    }

    setup_prometheus_metrics(args.metrics_port).await;

    let tracker = ProcessingTracker::connect(&config).context("Failed to start tracker")?;

    if !args.upload.is_empty() {
        let api = DocumentApi::from_config(&config)?;
        let outcome = upload_and_track(&api, &tracker, &args.upload).await;
        if outcome.tracked.is_empty() && args.exit_when_idle {
            warn!("No uploads were accepted; nothing to watch.");
            tracker.shutdown().await;
            anyhow::bail!("all {} uploads failed", outcome.failed.len());
        }
    } else if args.exit_when_idle {
        warn!("--exit-when-idle without --upload only exits once some document is tracked.");
    }

    let mut board = ProgressBoard::new();
    let stats = run_watch(
        &tracker,
        |records, stats, connected| board.render(records, stats, connected),
        args.exit_when_idle,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        },
    )
    .await;

    board.finish(&tracker.records().await);
    let connected = tracker.is_connected();
    tracker.shutdown().await;

    info!("--------------------");
    info!("{}", summary_line(&stats, connected));
    info!("--------------------");

    Ok(())
}
