//! Registry of known devices, their cached metadata labels, and staleness
//! bookkeeping.
//!
//! The registry is driven by a single writer (the ingestion loop) and holds
//! everything needed to emit and later retire a device's metric series.

use ahash::AHashMap as HashMap;
use chrono::{Duration, NaiveDateTime};
use tracing::{info, warn};

use crate::geom::{GeomInfo, MetadataFetcher};

/// One parsed GEOM provider as a fixed label tuple.
///
/// Every key always has a value, possibly the empty string. The metric sink
/// keys time series by the full tuple; a missing label would silently create
/// an orphaned series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    name: String,
    descr: String,
    mediasize: String,
    sectorsize: String,
    lunid: String,
    ident: String,
    rotationrate: String,
    fwsectors: String,
    fwheads: String,
}

impl DeviceMetadata {
    /// Label keys, in the order `label_values` returns them.
    pub const LABEL_KEYS: [&'static str; 9] = [
        "name",
        "descr",
        "mediasize",
        "sectorsize",
        "lunid",
        "ident",
        "rotationrate",
        "fwsectors",
        "fwheads",
    ];

    /// Builds the full label tuple from a lookup result. Absent fields
    /// become empty strings; `name` always comes from the registry key, the
    /// registry being authoritative on identity.
    pub fn new(name: &str, info: GeomInfo) -> Self {
        Self {
            name: name.to_string(),
            descr: info.descr.unwrap_or_default(),
            mediasize: info.mediasize.unwrap_or_default(),
            sectorsize: info.sectorsize.unwrap_or_default(),
            lunid: info.lunid.unwrap_or_default(),
            ident: info.ident.unwrap_or_default(),
            rotationrate: info.rotationrate.unwrap_or_default(),
            fwsectors: info.fwsectors.unwrap_or_default(),
            fwheads: info.fwheads.unwrap_or_default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values in `LABEL_KEYS` order, ready for `GaugeVec::with_label_values`.
    pub fn label_values(&self) -> [&str; 9] {
        [
            &self.name,
            &self.descr,
            &self.mediasize,
            &self.sectorsize,
            &self.lunid,
            &self.ident,
            &self.rotationrate,
            &self.fwsectors,
            &self.fwheads,
        ]
    }
}

/// Registry state for one device.
#[derive(Debug, Clone)]
struct DeviceEntry {
    metadata: DeviceMetadata,
    /// Most recent sample timestamp reported by the stream, not arrival time.
    last_seen: NaiveDateTime,
}

/// The set of currently known devices.
///
/// Metadata is fetched once, at first sight, and immutable afterwards;
/// storage devices do not change model or serial at runtime.
pub struct DeviceRegistry<F> {
    devices: HashMap<String, DeviceEntry>,
    fetcher: F,
}

impl<F: MetadataFetcher> DeviceRegistry<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            devices: HashMap::new(),
            fetcher,
        }
    }

    /// Records one sample for `name`, registering the device on first sight.
    ///
    /// The metadata lookup runs inline on the ingestion path; discovery is
    /// rare (once per physical device) and keeping it inline avoids a second
    /// state machine for "metadata not yet ready". A failed lookup registers
    /// the device with empty labels.
    pub async fn record_sample(
        &mut self,
        name: &str,
        timestamp: NaiveDateTime,
    ) -> &DeviceMetadata {
        if !self.devices.contains_key(name) {
            let info = match self.fetcher.fetch(name).await {
                Ok(info) => info,
                Err(err) => {
                    warn!(device = %name, error = %err, "metadata lookup failed, using empty labels");
                    GeomInfo::default()
                }
            };
            info!(device = %name, "registered new device");
            self.devices.insert(
                name.to_string(),
                DeviceEntry {
                    metadata: DeviceMetadata::new(name, info),
                    last_seen: timestamp,
                },
            );
        }

        let entry = self
            .devices
            .get_mut(name)
            .expect("entry inserted above if absent");
        entry.last_seen = timestamp;
        &entry.metadata
    }

    /// Evicts every device unseen for strictly longer than `grace` and
    /// returns their metadata so the caller can retire the metric series.
    /// The candidate set is snapshotted before any removal.
    pub fn sweep(&mut self, now: NaiveDateTime, grace: Duration) -> Vec<DeviceMetadata> {
        let stale: Vec<String> = self
            .devices
            .iter()
            .filter(|(_, entry)| now.signed_duration_since(entry.last_seen) > grace)
            .map(|(name, _)| name.clone())
            .collect();

        stale
            .iter()
            .filter_map(|name| self.devices.remove(name))
            .map(|entry| entry.metadata)
            .collect()
    }

    /// Unconditional removal.
    pub fn forget(&mut self, name: &str) {
        self.devices.remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn last_seen(&self, name: &str) -> Option<NaiveDateTime> {
        self.devices.get(name).map(|entry| entry.last_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::MetadataError;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    struct StaticFetcher {
        info: GeomInfo,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(info: GeomInfo) -> Self {
            Self {
                info,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MetadataFetcher for StaticFetcher {
        async fn fetch(&self, _device: &str) -> Result<GeomInfo, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.info.clone())
        }
    }

    struct FailingFetcher;

    impl MetadataFetcher for FailingFetcher {
        async fn fetch(&self, device: &str) -> Result<GeomInfo, MetadataError> {
            Err(MetadataError::Timeout {
                command: format!("geom -p {device}"),
                timeout: StdDuration::from_secs(5),
            })
        }
    }

    fn ts(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, secs)
            .unwrap()
    }

    fn disk_info() -> GeomInfo {
        GeomInfo {
            descr: Some("Samsung SSD 860".into()),
            mediasize: Some("250059350016 (233G)".into()),
            sectorsize: Some("512".into()),
            ..GeomInfo::default()
        }
    }

    #[tokio::test]
    async fn test_first_sight_fetches_metadata_once() {
        let mut registry = DeviceRegistry::new(StaticFetcher::new(disk_info()));

        let metadata = registry.record_sample("ada0", ts(0)).await.clone();
        assert_eq!(metadata.name(), "ada0");
        assert_eq!(metadata.label_values()[1], "Samsung SSD 860");

        // Second sample: metadata unchanged, no second lookup.
        let again = registry.record_sample("ada0", ts(5)).await.clone();
        assert_eq!(again, metadata);
        assert_eq!(registry.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.last_seen("ada0"), Some(ts(5)));
    }

    #[tokio::test]
    async fn test_failed_lookup_defaults_every_label_to_empty() {
        let mut registry = DeviceRegistry::new(FailingFetcher);
        let metadata = registry.record_sample("da9", ts(0)).await;

        let values = metadata.label_values();
        assert_eq!(values.len(), DeviceMetadata::LABEL_KEYS.len());
        assert_eq!(values[0], "da9");
        for value in &values[1..] {
            assert_eq!(*value, "");
        }
    }

    #[tokio::test]
    async fn test_name_label_overrides_registry_key_origin() {
        // Even with full lookup output the name comes from the stream.
        let mut registry = DeviceRegistry::new(StaticFetcher::new(disk_info()));
        let metadata = registry.record_sample("nda1", ts(0)).await;
        assert_eq!(metadata.label_values()[0], "nda1");
    }

    #[tokio::test]
    async fn test_same_timestamp_is_idempotent() {
        let mut registry = DeviceRegistry::new(StaticFetcher::new(disk_info()));
        registry.record_sample("ada0", ts(7)).await;
        registry.record_sample("ada0", ts(7)).await;
        assert_eq!(registry.last_seen("ada0"), Some(ts(7)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_uses_strict_inequality() {
        let mut registry = DeviceRegistry::new(StaticFetcher::new(GeomInfo::default()));
        registry.record_sample("ada0", ts(0)).await;
        registry.record_sample("ada1", ts(10)).await;

        let grace = Duration::seconds(30);

        // ada0 silent for exactly `grace`: not evicted.
        assert!(registry.sweep(ts(30), grace).is_empty());
        assert!(registry.contains("ada0"));

        // One second past grace: ada0 goes, ada1 stays.
        let evicted = registry.sweep(ts(31), grace);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].name(), "ada0");
        assert!(!registry.contains("ada0"));
        assert!(registry.contains("ada1"));
    }

    #[tokio::test]
    async fn test_sweep_evicts_multiple_devices() {
        let mut registry = DeviceRegistry::new(StaticFetcher::new(GeomInfo::default()));
        registry.record_sample("ada0", ts(0)).await;
        registry.record_sample("ada1", ts(1)).await;
        registry.record_sample("ada2", ts(50)).await;

        let mut evicted: Vec<String> = registry
            .sweep(ts(59), Duration::seconds(30))
            .into_iter()
            .map(|m| m.name().to_string())
            .collect();
        evicted.sort();
        assert_eq!(evicted, ["ada0", "ada1"]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_eviction_then_resample_refetches_metadata() {
        let mut registry = DeviceRegistry::new(StaticFetcher::new(disk_info()));
        registry.record_sample("ada0", ts(0)).await;
        registry.sweep(ts(40), Duration::seconds(30));
        assert!(registry.is_empty());

        registry.record_sample("ada0", ts(41)).await;
        assert_eq!(registry.fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.last_seen("ada0"), Some(ts(41)));
    }

    #[tokio::test]
    async fn test_out_of_order_timestamp_is_accepted_as_is() {
        let mut registry = DeviceRegistry::new(StaticFetcher::new(GeomInfo::default()));
        registry.record_sample("ada0", ts(20)).await;
        registry.record_sample("ada0", ts(10)).await;
        assert_eq!(registry.last_seen("ada0"), Some(ts(10)));
    }

    #[tokio::test]
    async fn test_forget() {
        let mut registry = DeviceRegistry::new(StaticFetcher::new(GeomInfo::default()));
        registry.record_sample("ada0", ts(0)).await;
        registry.forget("ada0");
        assert!(registry.is_empty());
    }
}
