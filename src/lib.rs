//! gstat-exporter library
//!
//! Prometheus exporter for FreeBSD GEOM per-device block I/O statistics.
//! It runs `gstat` in batch mode as a long-lived child process, parses one
//! CSV line per device per tick, caches GEOM metadata labels per device,
//! republishes the statistics as labelled gauges, and periodically retires
//! the metric series of devices that stop reporting.
//!
//! The crate root exposes the pipeline pieces so integration tests can
//! drive the ingestor over scripted streams with a canned metadata fetcher:
//!
//! ```rust
//! use gstat_exporter::geom::{GeomInfo, MetadataError, MetadataFetcher};
//! use gstat_exporter::ingest::Ingestor;
//! use gstat_exporter::metrics::GstatMetrics;
//! use gstat_exporter::sweep::StalenessSweeper;
//!
//! struct NoMetadata;
//!
//! impl MetadataFetcher for NoMetadata {
//!     async fn fetch(&self, _device: &str) -> Result<GeomInfo, MetadataError> {
//!         Ok(GeomInfo::default())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = prometheus::Registry::new();
//! let metrics = GstatMetrics::new(&registry).unwrap();
//! let now = chrono::Local::now().naive_local();
//! let sweeper = StalenessSweeper::new(
//!     chrono::Duration::seconds(60),
//!     chrono::Duration::seconds(300),
//!     now,
//! );
//! let mut ingestor = Ingestor::new(NoMetadata, sweeper, metrics);
//! ingestor
//!     .handle_line("2024-01-01 00:00:00,ada0,1,10,5,4,20,1,5,4,20,1,0,0,0,0,0,0,30", now)
//!     .await;
//! assert!(ingestor.registry().contains("ada0"));
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod geom;
pub mod handlers;
pub mod ingest;
pub mod metrics;
pub mod parser;
pub mod registry;
pub mod state;
pub mod sweep;

// Re-export main types for convenience
pub use ingest::Ingestor;
pub use metrics::GstatMetrics;
pub use parser::SampleRecord;
pub use registry::{DeviceMetadata, DeviceRegistry};
pub use sweep::StalenessSweeper;
