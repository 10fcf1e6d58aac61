//! Configuration management for function-instance-control.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use function_instance_control::host::{DEFAULT_MAX_CONCURRENT_CALLS, DEFAULT_PORT};
use function_instance_control::registry::DEFAULT_EXCEPTION_HISTORY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "::";
pub const DEFAULT_INSTANCE_ID: &str = "0";
pub const MAX_SYNTHETIC_LOAD: u32 = 100_000;
pub const MAX_EXCEPTION_HISTORY: usize = 10_000;

/// Effective configuration of the control service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "max-concurrent-calls")]
    pub max_concurrent_calls: Option<usize>,

    // Instance
    #[serde(alias = "instance-id")]
    pub instance_id: Option<String>,
    #[serde(alias = "exception-history")]
    pub exception_history: Option<usize>,

    // Feature flags
    #[serde(alias = "enable-prometheus")]
    pub enable_prometheus: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    /// Invocations per second for the synthetic execution path
    #[serde(alias = "synthetic-load")]
    pub synthetic_load: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            max_concurrent_calls: Some(DEFAULT_MAX_CONCURRENT_CALLS),
            instance_id: Some(DEFAULT_INSTANCE_ID.to_string()),
            exception_history: Some(DEFAULT_EXCEPTION_HISTORY),
            enable_prometheus: Some(true),
            log_level: Some("info".into()),
            synthetic_load: None,
        }
    }
}

/// Parses a log level name as accepted by `--log-level`.
pub fn parse_log_level(name: &str) -> Option<LogLevel> {
    match name.to_ascii_lowercase().as_str() {
        "off" => Some(LogLevel::Off),
        "error" => Some(LogLevel::Error),
        "warn" => Some(LogLevel::Warn),
        "info" => Some(LogLevel::Info),
        "debug" => Some(LogLevel::Debug),
        "trace" => Some(LogLevel::Trace),
        _ => None,
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    if cfg.max_concurrent_calls == Some(0) {
        return Err("max_concurrent_calls must be greater than 0".into());
    }

    if let Some(n) = cfg.exception_history {
        if n == 0 || n > MAX_EXCEPTION_HISTORY {
            return Err(format!(
                "exception_history must be between 1 and {}, got {}",
                MAX_EXCEPTION_HISTORY, n
            )
            .into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if parse_log_level(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}', expected one of off, error, warn, info, debug, trace",
                level
            )
            .into());
        }
    }

    if let Some(rate) = cfg.synthetic_load {
        if rate == 0 || rate > MAX_SYNTHETIC_LOAD {
            return Err(format!(
                "synthetic_load must be between 1 and {}, got {}",
                MAX_SYNTHETIC_LOAD, rate
            )
            .into());
        }
    }

    if cfg.instance_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err("instance_id must not be empty".into());
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(n) = args.max_concurrent_calls {
        config.max_concurrent_calls = Some(n);
    }
    if let Some(id) = &args.instance_id {
        config.instance_id = Some(id.clone());
    }
    if let Some(n) = args.exception_history {
        config.exception_history = Some(n);
    }
    if args.disable_prometheus {
        config.enable_prometheus = Some(false);
    }
    if let Some(rate) = args.synthetic_load {
        config.synthetic_load = Some(rate);
    }

    Ok(config)
}

/// Loads a config file, falling back to defaults when none exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/function-instance-control/config.yaml",
                "/etc/function-instance-control/config.yml",
                "/etc/function-instance-control/config.json",
                "./function-instance-control.yaml",
                "./function-instance-control.yml",
                "./function-instance-control.json",
            ];
            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

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

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
