//! CLI arguments for gstat-exporter.
//!
//! This module defines the command-line interface structure using the clap
//! library.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "gstat-exporter",
    about = "Prometheus exporter for FreeBSD GEOM (gstat) per-device I/O statistics",
    long_about = "Prometheus exporter for FreeBSD GEOM per-device I/O statistics.\n\n\
                  Runs gstat in batch mode, caches GEOM metadata per device, exposes the \
                  per-device statistics as labelled gauges, and retires the series of \
                  devices that stop reporting.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// gstat sampling tick in seconds
    #[arg(long)]
    pub gstat_interval: Option<u64>,

    /// Seconds between staleness sweeps of the device registry
    #[arg(long)]
    pub sweep_interval: Option<u64>,

    /// Seconds a device may stay silent before its metrics are retired
    #[arg(long)]
    pub grace: Option<u64>,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl Default for ConfigFormat {
    fn default() -> Self {
        ConfigFormat::Yaml
    }
}
