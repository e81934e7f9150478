//! Prometheus metrics definitions for gstat-exporter.
//!
//! All metrics live in an explicit `GstatMetrics` value registered against a
//! caller-supplied `Registry`; there are no module-level globals. Every
//! per-device gauge carries the full 9-key device label tuple.

use prometheus::{Gauge, GaugeVec, Opts, Registry};

use crate::parser::SampleRecord;
use crate::registry::DeviceMetadata;

/// The metric sink: the liveness gauge, the 17 per-device statistic gauges
/// and the exporter's own telemetry.
///
/// Metric names keep the historical `miliseconds` spelling of the original
/// exporter so existing dashboards keep working.
#[derive(Clone)]
pub struct GstatMetrics {
    /// 1 while connected to the gstat stream, 0 during a reconnect window.
    pub up: Gauge,

    pub queue_depth: GaugeVec,
    pub total_ops: GaugeVec,

    pub read_ops: GaugeVec,
    pub read_size: GaugeVec,
    pub read_kbs: GaugeVec,
    pub read_ms: GaugeVec,

    pub write_ops: GaugeVec,
    pub write_size: GaugeVec,
    pub write_kbs: GaugeVec,
    pub write_ms: GaugeVec,

    pub delete_ops: GaugeVec,
    pub delete_size: GaugeVec,
    pub delete_kbs: GaugeVec,
    pub delete_ms: GaugeVec,

    pub other_ops: GaugeVec,
    pub other_ms: GaugeVec,

    pub busy: GaugeVec,

    // ========== Exporter self-telemetry ==========
    pub devices_tracked: Gauge,
    pub scrape_duration: Gauge,
}

fn device_gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &DeviceMetadata::LABEL_KEYS)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl GstatMetrics {
    /// Creates and registers all gauges with the registry.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let up = Gauge::new(
            "gstat_up",
            "Whether the exporter is reading the gstat stream (1) or reconnecting (0)",
        )?;
        registry.register(Box::new(up.clone()))?;

        let devices_tracked = Gauge::new(
            "gstat_exporter_devices_tracked",
            "Number of devices currently tracked by the exporter",
        )?;
        registry.register(Box::new(devices_tracked.clone()))?;

        let scrape_duration = Gauge::new(
            "gstat_exporter_scrape_duration_seconds",
            "Time spent serving the last /metrics request",
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;

        Ok(Self {
            up,
            queue_depth: device_gauge(
                registry,
                "gstat_queue_depth",
                "The queue depth for this GEOM",
            )?,
            total_ops: device_gauge(
                registry,
                "gstat_total_operations_per_second",
                "The total number operations for this GEOM",
            )?,
            read_ops: device_gauge(
                registry,
                "gstat_read_operations_per_second",
                "The number of read operations per second for this GEOM",
            )?,
            read_size: device_gauge(
                registry,
                "gstat_read_size_kilobytes",
                "The size in kilobytes of read operations for this GEOM",
            )?,
            read_kbs: device_gauge(
                registry,
                "gstat_read_kilobytes_per_second",
                "The speed in kilobytes per second of read operations for this GEOM",
            )?,
            read_ms: device_gauge(
                registry,
                "gstat_miliseconds_per_read",
                "The speed in miliseconds per read operation for this GEOM",
            )?,
            write_ops: device_gauge(
                registry,
                "gstat_write_operations_per_second",
                "The number of write operations per second for this GEOM",
            )?,
            write_size: device_gauge(
                registry,
                "gstat_write_size_kilobytes",
                "The size in kilobytes of write operations for this GEOM",
            )?,
            write_kbs: device_gauge(
                registry,
                "gstat_write_kilobytes_per_second",
                "The speed in kilobytes per second of write operations for this GEOM",
            )?,
            write_ms: device_gauge(
                registry,
                "gstat_miliseconds_per_write",
                "The speed in miliseconds per write operation for this GEOM",
            )?,
            delete_ops: device_gauge(
                registry,
                "gstat_delete_operations_per_second",
                "The number of delete operations per second for this GEOM",
            )?,
            delete_size: device_gauge(
                registry,
                "gstat_delete_size_kilobytes",
                "The size in kilobytes of delete operations for this GEOM",
            )?,
            delete_kbs: device_gauge(
                registry,
                "gstat_delete_kilobytes_per_second",
                "The speed in kilobytes per second of delete operations for this GEOM",
            )?,
            delete_ms: device_gauge(
                registry,
                "gstat_miliseconds_per_delete",
                "The speed in miliseconds per delete operation for this GEOM",
            )?,
            other_ops: device_gauge(
                registry,
                "gstat_other_operations_per_second",
                "The number of other operations (BIO_FLUSH) per second for this GEOM",
            )?,
            other_ms: device_gauge(
                registry,
                "gstat_miliseconds_per_other",
                "The speed in miliseconds per other operation (BIO_FLUSH) for this GEOM",
            )?,
            busy: device_gauge(
                registry,
                "gstat_percent_busy",
                "The percent of the time this GEOM is busy",
            )?,
            devices_tracked,
            scrape_duration,
        })
    }

    /// All 17 per-device statistic gauges. `up` is deliberately absent; it
    /// carries no device labels and survives evictions.
    fn statistic_gauges(&self) -> [&GaugeVec; 17] {
        [
            &self.queue_depth,
            &self.total_ops,
            &self.read_ops,
            &self.read_size,
            &self.read_kbs,
            &self.read_ms,
            &self.write_ops,
            &self.write_size,
            &self.write_kbs,
            &self.write_ms,
            &self.delete_ops,
            &self.delete_size,
            &self.delete_kbs,
            &self.delete_ms,
            &self.other_ops,
            &self.other_ms,
            &self.busy,
        ]
    }

    /// Sets every statistic gauge for one sample under the device's labels.
    pub fn record(&self, sample: &SampleRecord, metadata: &DeviceMetadata) {
        let labels = metadata.label_values();

        self.queue_depth
            .with_label_values(&labels)
            .set(sample.queue_depth);
        self.total_ops
            .with_label_values(&labels)
            .set(sample.total_ops_per_second);

        self.read_ops
            .with_label_values(&labels)
            .set(sample.read_ops_per_second);
        self.read_size
            .with_label_values(&labels)
            .set(sample.read_size_kilobytes);
        self.read_kbs
            .with_label_values(&labels)
            .set(sample.read_kilobytes_per_second);
        self.read_ms
            .with_label_values(&labels)
            .set(sample.ms_per_read);

        self.write_ops
            .with_label_values(&labels)
            .set(sample.write_ops_per_second);
        self.write_size
            .with_label_values(&labels)
            .set(sample.write_size_kilobytes);
        self.write_kbs
            .with_label_values(&labels)
            .set(sample.write_kilobytes_per_second);
        self.write_ms
            .with_label_values(&labels)
            .set(sample.ms_per_write);

        self.delete_ops
            .with_label_values(&labels)
            .set(sample.delete_ops_per_second);
        self.delete_size
            .with_label_values(&labels)
            .set(sample.delete_size_kilobytes);
        self.delete_kbs
            .with_label_values(&labels)
            .set(sample.delete_kilobytes_per_second);
        self.delete_ms
            .with_label_values(&labels)
            .set(sample.ms_per_delete);

        self.other_ops
            .with_label_values(&labels)
            .set(sample.other_ops_per_second);
        self.other_ms
            .with_label_values(&labels)
            .set(sample.ms_per_other);

        self.busy
            .with_label_values(&labels)
            .set(sample.percent_busy);
    }

    /// Removes every statistic series for one device. The liveness gauge is
    /// untouched. Removing a series that was never set is not an error.
    pub fn remove_device(&self, metadata: &DeviceMetadata) {
        let labels = metadata.label_values();
        for gauge in self.statistic_gauges() {
            let _ = gauge.remove_label_values(&labels);
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.up.set(if connected { 1.0 } else { 0.0 });
    }
}
