use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use book_recorder::collector::Scheduler;
use book_recorder::config::{self, AppConfig};
use book_recorder::market_data::adapters::okx::OkxClient;
use book_recorder::persist;
use book_recorder::telemetry;

/// Sample venue order books on a fixed interval and store the top levels.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML config file; defaults to config/recorder.toml when it exists
    #[arg(short, long, env = "RECORDER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    telemetry::init_tracing(&cfg.log_filter);
    telemetry::init_metrics(cfg.metrics_addr()?)?;

    let targets = cfg.targets()?;
    let interval = cfg.interval()?;
    for target in &targets {
        info!(instrument = %target.instrument_id, destination = %target.destination, depth = target.depth, "instrument configured");
    }

    let source = Arc::new(OkxClient::new(&cfg.provider).context("building http client")?);
    let sink = persist::open_sink(&cfg.storage).await.context("opening storage")?;

    // Schema setup runs once per destination; a failure here is fatal.
    for destination in config::distinct_destinations(&targets) {
        sink.ensure_destination(&destination)
            .await
            .with_context(|| format!("preparing destination {destination}"))?;
    }

    let scheduler = Scheduler::new(targets, source, sink, interval, cfg.shutdown_policy());
    scheduler.run(shutdown_signal()).await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
