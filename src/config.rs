//! Configuration management for gstat-exporter.
//!
//! This module handles loading, merging, and validating configuration from
//! files and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
/// Port registered by the original gstat exporter.
pub const DEFAULT_PORT: u16 = 9248;
pub const DEFAULT_GSTAT_INTERVAL: u64 = 5;
pub const DEFAULT_SWEEP_INTERVAL: u64 = 60;
pub const DEFAULT_GRACE: u64 = 300;

/// Exporter configuration. Every field is optional so that file values and
/// CLI flags can be merged; effective values fall back to the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Sampling and staleness
    #[serde(alias = "gstat-interval")]
    pub gstat_interval_seconds: Option<u64>,
    #[serde(alias = "sweep-interval")]
    pub sweep_interval_seconds: Option<u64>,
    #[serde(alias = "grace")]
    pub grace_seconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            gstat_interval_seconds: Some(DEFAULT_GSTAT_INTERVAL),
            sweep_interval_seconds: Some(DEFAULT_SWEEP_INTERVAL),
            grace_seconds: Some(DEFAULT_GRACE),
        }
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn gstat_interval(&self) -> u64 {
        self.gstat_interval_seconds.unwrap_or(DEFAULT_GSTAT_INTERVAL)
    }

    pub fn sweep_interval(&self) -> u64 {
        self.sweep_interval_seconds.unwrap_or(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn grace(&self) -> u64 {
        self.grace_seconds.unwrap_or(DEFAULT_GRACE)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.gstat_interval() == 0 {
        return Err("gstat_interval_seconds must be greater than zero".into());
    }
    if cfg.grace() == 0 {
        return Err("grace_seconds must be greater than zero".into());
    }
    if cfg.grace() < cfg.gstat_interval() {
        return Err(format!(
            "grace_seconds ({}) must not be shorter than gstat_interval_seconds ({}): \
             every healthy device would be evicted between ticks",
            cfg.grace(),
            cfg.gstat_interval()
        )
        .into());
    }
    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if args.gstat_interval.is_some() {
        config.gstat_interval_seconds = args.gstat_interval;
    }
    if args.sweep_interval.is_some() {
        config.sweep_interval_seconds = args.sweep_interval;
    }
    if args.grace.is_some() {
        config.grace_seconds = args.grace;
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/usr/local/etc/gstat-exporter.yaml",
            "/usr/local/etc/gstat-exporter.yml",
            "/etc/gstat-exporter.yaml",
            "./gstat-exporter.yaml",
            "./gstat-exporter.yml",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.port(), DEFAULT_PORT);
        assert_eq!(cfg.bind(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.gstat_interval(), DEFAULT_GSTAT_INTERVAL);
        assert_eq!(cfg.sweep_interval(), DEFAULT_SWEEP_INTERVAL);
        assert_eq!(cfg.grace(), DEFAULT_GRACE);
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let args = Args {
            port: Some(9999),
            grace: Some(30),
            no_config: true,
            ..Args::default()
        };
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.port(), 9999);
        assert_eq!(cfg.grace(), 30);
        // Untouched fields keep defaults.
        assert_eq!(cfg.sweep_interval(), DEFAULT_SWEEP_INTERVAL);
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "port: 9100\ngrace_seconds: 120").unwrap();

        let cfg = load_config(file.path().to_str()).unwrap();
        assert_eq!(cfg.port(), 9100);
        assert_eq!(cfg.grace(), 120);
        assert_eq!(cfg.gstat_interval(), DEFAULT_GSTAT_INTERVAL);
    }

    #[test]
    fn test_load_toml_file_with_aliases() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 9100\n\"sweep-interval\" = 15").unwrap();

        let cfg = load_config(file.path().to_str()).unwrap();
        assert_eq!(cfg.port(), 9100);
        assert_eq!(cfg.sweep_interval(), 15);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "prot: 9100").unwrap();
        assert!(load_config(file.path().to_str()).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_tick_and_short_grace() {
        let mut cfg = Config::default();
        cfg.gstat_interval_seconds = Some(0);
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.grace_seconds = Some(2);
        cfg.gstat_interval_seconds = Some(5);
        assert!(validate_effective_config(&cfg).is_err());
    }
}
