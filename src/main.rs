//! gstat-exporter entry point.
//!
//! Initializes logging and metrics, spawns the gstat ingestion task, and
//! serves the Prometheus scrape endpoint until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{routing::get, Router};
use chrono::Local;
use clap::Parser;
use prometheus::Registry;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, Level};

use gstat_exporter::cli::{Args, LogLevel};
use gstat_exporter::config::{resolve_config, show_config, validate_effective_config};
use gstat_exporter::geom::GeomFetcher;
use gstat_exporter::handlers::{metrics_handler, root_handler};
use gstat_exporter::ingest::{self, Ingestor};
use gstat_exporter::metrics::GstatMetrics;
use gstat_exporter::state::AppState;
use gstat_exporter::sweep::StalenessSweeper;

/// Initializes tracing logging subsystem with the configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = resolve_config(&args).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    if args.check_config {
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("Configuration is valid");
        return Ok(());
    }
    if args.show_config {
        return show_config(&config, args.config_format)
            .map_err(|e| anyhow::anyhow!(e.to_string()));
    }

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&args);
    info!("Starting gstat-exporter");

    let registry = Registry::new();
    let metrics = GstatMetrics::new(&registry).context("failed to register metrics")?;

    let sweeper = StalenessSweeper::new(
        chrono::Duration::seconds(config.sweep_interval() as i64),
        chrono::Duration::seconds(config.grace() as i64),
        Local::now().naive_local(),
    );
    let ingestor = Ingestor::new(GeomFetcher::default(), sweeper, metrics.clone());
    let ingest_task = tokio::spawn(ingest::run(ingestor, config.gstat_interval()));
    info!(
        tick = config.gstat_interval(),
        sweep_interval = config.sweep_interval(),
        grace = config.grace(),
        "ingestion task started"
    );

    let state = Arc::new(AppState {
        registry,
        metrics,
        start_time: Instant::now(),
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    // Graceful shutdown on SIGINT/SIGTERM
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.bind(), config.port()).parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("gstat-exporter listening on http://{}", addr);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        result = ingest_task => {
            // The loop only returns if gstat cannot be spawned; let the
            // process supervisor restart us.
            match result {
                Ok(Err(e)) => {
                    error!("Ingestion task failed: {:#}", e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Ingestion task panicked: {}", e);
                    return Err(e.into());
                }
                Ok(Ok(())) => unreachable!("ingestion loop runs forever"),
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    info!("gstat-exporter stopped gracefully");
    Ok(())
}
