//! GEOM device metadata lookup via the `geom` userland tool.
//!
//! `geom -p <name>` prints a line-oriented key/value block; only devices in
//! the DISK class carry the descriptive fields we use as metric labels.
//! Sample output:
//!
//! ```text
//! Geom class: DISK
//! Geom name: ada0
//! Providers:
//! 1. Name: ada0
//!    Mediasize: 250059350016 (233G)
//!    Sectorsize: 512
//!    Mode: r2w2e4
//!    descr: Samsung SSD 860 EVO mSATA 250GB
//!    lunid: 5002538e700b753f
//!    ident: S41MNG0K907238X
//!    rotationrate: 0
//!    fwsectors: 63
//!    fwheads: 16
//! ```

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Device class whose providers carry disk metadata.
const DISK_CLASS: &str = "DISK";

/// How long a `geom -p` invocation may run before the child is killed.
/// A hung lookup must not stall ingestion for every other device.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the external metadata lookup. All of them are recovered by
/// registering the device with empty label values.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    Exit {
        command: String,
        status: std::process::ExitStatus,
    },

    #[error("{command} did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// Descriptive fields parsed from `geom -p` output. Any subset may be
/// present; non-DISK devices yield an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeomInfo {
    pub descr: Option<String>,
    pub mediasize: Option<String>,
    pub sectorsize: Option<String>,
    pub lunid: Option<String>,
    pub ident: Option<String>,
    pub rotationrate: Option<String>,
    pub fwsectors: Option<String>,
    pub fwheads: Option<String>,
}

/// Source of descriptive device metadata, looked up once per device on
/// first sight. Test code substitutes a canned implementation.
pub trait MetadataFetcher {
    fn fetch(
        &self,
        device: &str,
    ) -> impl Future<Output = Result<GeomInfo, MetadataError>> + Send;
}

fn second_token(line: &str) -> Option<String> {
    line.split_whitespace().nth(1).map(str::to_string)
}

/// Parses the key/value block printed by `geom -p`.
///
/// Scanning stops at the first `Geom class:` line naming a class other than
/// DISK; the device then simply has no disk metadata.
pub fn parse_geom_output(output: &str) -> GeomInfo {
    let mut info = GeomInfo::default();

    for line in output.lines() {
        let line = line.trim();

        if let Some(class) = line.strip_prefix("Geom class:") {
            if class.trim() != DISK_CLASS {
                break;
            }
        } else if let Some(rest) = line.strip_prefix("Mediasize: ") {
            // Keep the human-readable suffix, e.g. "250059350016 (233G)".
            info.mediasize = Some(rest.to_string());
        } else if line.starts_with("Sectorsize: ") {
            info.sectorsize = second_token(line);
        } else if let Some(rest) = line.strip_prefix("descr: ") {
            info.descr = Some(rest.to_string());
        } else if line.starts_with("lunid: ") {
            info.lunid = second_token(line);
        } else if line.starts_with("ident: ") {
            info.ident = second_token(line);
        } else if line.starts_with("rotationrate: ") {
            info.rotationrate = second_token(line);
        } else if line.starts_with("fwsectors: ") {
            info.fwsectors = second_token(line);
        } else if line.starts_with("fwheads: ") {
            info.fwheads = second_token(line);
        }
    }

    info
}

/// Production fetcher: runs `geom -p <name>` with a hard timeout.
#[derive(Debug, Clone)]
pub struct GeomFetcher {
    timeout: Duration,
}

impl GeomFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GeomFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl MetadataFetcher for GeomFetcher {
    async fn fetch(&self, device: &str) -> Result<GeomInfo, MetadataError> {
        let command = format!("geom -p {device}");
        debug!(%device, "fetching GEOM metadata");

        let output = Command::new("geom")
            .arg("-p")
            .arg(device)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| MetadataError::Timeout {
                command: command.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| MetadataError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MetadataError::Exit {
                command,
                status: output.status,
            });
        }

        Ok(parse_geom_output(&String::from_utf8_lossy(&output.stdout)))
    }
}
