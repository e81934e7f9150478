//! The ingestion loop: runs gstat as a long-lived child process and drives
//! the parse → registry → metrics pipeline, including staleness checks.

use std::process::Stdio;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::geom::MetadataFetcher;
use crate::metrics::GstatMetrics;
use crate::parser::parse_line;
use crate::registry::DeviceRegistry;
use crate::sweep::StalenessSweeper;

/// Per-line pipeline state. One instance, one writer; the HTTP side only
/// ever reads gauge values through the shared prometheus registry.
pub struct Ingestor<F> {
    registry: DeviceRegistry<F>,
    sweeper: StalenessSweeper,
    metrics: GstatMetrics,
}

impl<F: MetadataFetcher> Ingestor<F> {
    pub fn new(fetcher: F, sweeper: StalenessSweeper, metrics: GstatMetrics) -> Self {
        Self {
            registry: DeviceRegistry::new(fetcher),
            sweeper,
            metrics,
        }
    }

    /// Processes one line of the gstat stream, then runs the staleness
    /// check. Malformed lines are discarded; they never stop the loop.
    pub async fn handle_line(&mut self, line: &str, now: NaiveDateTime) {
        match parse_line(line) {
            Ok(None) => debug!("skipping gstat header line"),
            Err(err) => debug!(error = %err, line, "discarding malformed gstat line"),
            Ok(Some(sample)) => {
                let metadata = self
                    .registry
                    .record_sample(&sample.name, sample.timestamp)
                    .await;
                self.metrics.set_connected(true);
                self.metrics.record(&sample, metadata);
                self.metrics.devices_tracked.set(self.registry.len() as f64);
            }
        }

        if self.sweeper.maybe_sweep(now, &mut self.registry, &self.metrics) > 0 {
            self.metrics.devices_tracked.set(self.registry.len() as f64);
        }
    }

    /// Marks the stream as lost until the next successfully processed line.
    pub fn on_disconnect(&mut self) {
        self.metrics.set_connected(false);
    }

    pub fn registry(&self) -> &DeviceRegistry<F> {
        &self.registry
    }
}

fn gstat_command(tick_seconds: u64) -> Command {
    let mut command = Command::new("gstat");
    command
        .arg("-pdosCI")
        .arg(format!("{tick_seconds}s"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Runs the ingestion loop forever: spawn gstat, consume its stdout line by
/// line, and respawn immediately when the stream ends. gstat is expected to
/// be long-lived; crash looping is the process supervisor's job, so there is
/// no backoff here. Only a failed spawn is an error, surfaced to the caller.
pub async fn run<F: MetadataFetcher>(mut ingestor: Ingestor<F>, tick_seconds: u64) -> Result<()> {
    loop {
        let mut child = gstat_command(tick_seconds)
            .spawn()
            .context("failed to spawn gstat")?;
        let stdout = child
            .stdout
            .take()
            .context("gstat child has no stdout pipe")?;

        info!(tick_seconds, "reading gstat stream");
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    ingestor.handle_line(&line, Local::now().naive_local()).await;
                }
                Ok(None) => {
                    warn!("gstat stream ended, reacquiring");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "error reading gstat stream, reacquiring");
                    break;
                }
            }
        }

        ingestor.on_disconnect();
        if let Err(err) = child.kill().await {
            debug!(error = %err, "failed to kill exited gstat child");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{GeomInfo, MetadataError};
    use chrono::{Duration, NaiveDate};
    use prometheus::Registry;

    struct EmptyFetcher;

    impl MetadataFetcher for EmptyFetcher {
        async fn fetch(&self, _device: &str) -> Result<GeomInfo, MetadataError> {
            Ok(GeomInfo::default())
        }
    }

    fn ts(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, secs)
            .unwrap()
    }

    fn ingestor(metrics: GstatMetrics) -> Ingestor<EmptyFetcher> {
        let sweeper = StalenessSweeper::new(Duration::seconds(5), Duration::seconds(10), ts(0));
        Ingestor::new(EmptyFetcher, sweeper, metrics)
    }

    #[tokio::test]
    async fn test_header_then_sample_registers_device() {
        let registry = Registry::new();
        let metrics = GstatMetrics::new(&registry).unwrap();
        let mut ingestor = ingestor(metrics.clone());

        ingestor.handle_line("timestamp,name,rest", ts(0)).await;
        assert!(ingestor.registry().is_empty());

        ingestor
            .handle_line(
                "2024-01-01 00:00:00,ada0,1,10,5,4,20,1,5,4,20,1,0,0,0,0,0,0,30",
                ts(0),
            )
            .await;

        assert!(ingestor.registry().contains("ada0"));
        assert_eq!(ingestor.registry().last_seen("ada0"), Some(ts(0)));
        assert_eq!(metrics.up.get(), 1.0);
        assert_eq!(metrics.devices_tracked.get(), 1.0);
    }

    #[tokio::test]
    async fn test_malformed_line_leaves_state_unchanged() {
        let registry = Registry::new();
        let metrics = GstatMetrics::new(&registry).unwrap();
        let mut ingestor = ingestor(metrics.clone());

        ingestor.handle_line("garbage,with,three", ts(0)).await;
        assert!(ingestor.registry().is_empty());
        assert_eq!(metrics.up.get(), 0.0);
    }

    #[tokio::test]
    async fn test_disconnect_drops_up_gauge() {
        let registry = Registry::new();
        let metrics = GstatMetrics::new(&registry).unwrap();
        let mut ingestor = ingestor(metrics.clone());

        ingestor
            .handle_line(
                "2024-01-01 00:00:00,ada0,1,10,5,4,20,1,5,4,20,1,0,0,0,0,0,0,30",
                ts(0),
            )
            .await;
        assert_eq!(metrics.up.get(), 1.0);

        ingestor.on_disconnect();
        assert_eq!(metrics.up.get(), 0.0);
    }

    #[tokio::test]
    async fn test_sweep_runs_after_line_processing() {
        let registry = Registry::new();
        let metrics = GstatMetrics::new(&registry).unwrap();
        let mut ingestor = ingestor(metrics.clone());

        ingestor
            .handle_line(
                "2024-01-01 00:00:00,ada0,1,10,5,4,20,1,5,4,20,1,0,0,0,0,0,0,30",
                ts(0),
            )
            .await;

        // ada1 keeps reporting 20 seconds later; ada0 is past grace by then.
        ingestor
            .handle_line(
                "2024-01-01 00:00:20,ada1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0",
                ts(20),
            )
            .await;

        assert!(!ingestor.registry().contains("ada0"));
        assert!(ingestor.registry().contains("ada1"));
        assert_eq!(metrics.devices_tracked.get(), 1.0);
    }
}
