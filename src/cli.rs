//! CLI arguments and subcommands for function-instance-control.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
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
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "function-instance-control",
    about = "Control-plane endpoint for a function instance: status and get-and-reset metrics",
    long_about = "Control-plane endpoint for a function instance.\n\n\
                  Serves GetFunctionStatus and GetAndResetMetrics over HTTP/JSON so an external \
                  collector can read the live state of the instance and scrape its counters \
                  without double-counting or losing concurrent updates.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Control service listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides log_level from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Maximum number of control calls handled at once
    #[arg(long)]
    pub max_concurrent_calls: Option<usize>,

    /// Instance identifier reported in FunctionStatus
    #[arg(long)]
    pub instance_id: Option<String>,

    /// Number of recent exceptions kept per kind
    #[arg(long)]
    pub exception_history: Option<usize>,

    /// Disable the Prometheus /metrics endpoint
    #[arg(long)]
    pub disable_prometheus: bool,

    /// Simulate N invocations per second against the registry
    #[arg(long)]
    pub synthetic_load: Option<u32>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
