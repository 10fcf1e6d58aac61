//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("function-instance-control.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Function Instance Control Configuration
# ========================================
#
# Server Configuration
# --------------------
# bind: "::"                   # Bind IP (:: = all interfaces, IPv4 and IPv6)
# port: 9093                   # Control service port
# max_concurrent_calls: 10     # Calls handled at once; extra calls queue
#
# Instance
# --------
# instance_id: "0"             # Reported in GetFunctionStatus
# exception_history: 10        # Recent exceptions kept per kind (1..10000)
#
# Feature Flags
# -------------
# enable_prometheus: true      # Serve lifetime counters at /metrics
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Synthetic Load
# --------------
# synthetic_load: null         # Simulated invocations per second (null = off)
"#;

    format!("{comments}\n{yaml}")
}
