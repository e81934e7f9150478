//! Staleness sweeping: periodic eviction of devices that stopped reporting.

use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::geom::MetadataFetcher;
use crate::metrics::GstatMetrics;
use crate::registry::DeviceRegistry;

/// Scheduling policy for registry sweeps.
///
/// `interval` throttles how often the registry is scanned; `grace` is how
/// long an individual device may stay silent before eviction. The two knobs
/// are independent.
pub struct StalenessSweeper {
    interval: Duration,
    grace: Duration,
    last_sweep: NaiveDateTime,
}

impl StalenessSweeper {
    pub fn new(interval: Duration, grace: Duration, now: NaiveDateTime) -> Self {
        Self {
            interval,
            grace,
            last_sweep: now,
        }
    }

    /// Sweeps the registry if more than `interval` has passed since the last
    /// sweep, retiring the metric series of every evicted device. Returns
    /// the number of evictions.
    pub fn maybe_sweep<F: MetadataFetcher>(
        &mut self,
        now: NaiveDateTime,
        registry: &mut DeviceRegistry<F>,
        metrics: &GstatMetrics,
    ) -> usize {
        if now.signed_duration_since(self.last_sweep) <= self.interval {
            return 0;
        }
        self.last_sweep = now;

        let evicted = registry.sweep(now, self.grace);
        for metadata in &evicted {
            info!(device = %metadata.name(), "device silent beyond grace period, retiring its metrics");
            metrics.remove_device(metadata);
        }
        evicted.len()
    }
}
