//! function-instance-control
//!
//! Control-plane endpoint for a function instance with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod synthetic;

use clap::Parser;
use function_instance_control::{
    ControlService, HostOptions, MetricsRegistry, ServiceHost, StatusField,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, level_filters::LevelFilter};

use cli::{Args, Commands, LogLevel};
use commands::command_config;
use config::{
    parse_log_level, resolve_config, show_config, validate_effective_config, Config,
    DEFAULT_BIND_ADDR, DEFAULT_INSTANCE_ID,
};
use function_instance_control::host::{DEFAULT_MAX_CONCURRENT_CALLS, DEFAULT_PORT};
use function_instance_control::registry::DEFAULT_EXCEPTION_HISTORY;

/// Initializes tracing logging subsystem with configured log level.
/// CLI flag wins over the config file.
fn setup_logging(config: &Config, args: &Args) {
    let level = args
        .log_level
        .or_else(|| config.log_level.as_deref().and_then(parse_log_level))
        .unwrap_or(LogLevel::Info);

    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Translates the effective config into transport settings.
fn host_options(config: &Config) -> Result<HostOptions, Box<dyn std::error::Error>> {
    let bind: IpAddr = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).parse()?;
    let port = config.port.unwrap_or(DEFAULT_PORT);

    Ok(HostOptions {
        addr: SocketAddr::new(bind, port),
        max_concurrent_calls: config
            .max_concurrent_calls
            .unwrap_or(DEFAULT_MAX_CONCURRENT_CALLS),
        enable_prometheus: config.enable_prometheus.unwrap_or(true),
        instance_id: instance_id(config),
    })
}

fn instance_id(config: &Config) -> String {
    config
        .instance_id
        .clone()
        .unwrap_or_else(|| DEFAULT_INSTANCE_ID.to_string())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&config, &args);

    info!("Starting function-instance-control");

    let registry = Arc::new(MetricsRegistry::with_exception_history(
        config.exception_history.unwrap_or(DEFAULT_EXCEPTION_HISTORY),
    ));
    debug!("Metrics registry initialized");

    let load = config
        .synthetic_load
        .map(|rate| synthetic::spawn(registry.clone(), rate));

    let service = ControlService::new(registry.clone(), instance_id(&config));
    let host = ServiceHost::new(service, host_options(&config)?)?;
    let bound = host.bind().await?;

    let result = bound.serve(shutdown_signal()).await;

    if let Some(task) = load {
        task.abort();
    }
    registry.set_status_field(StatusField::Running(false));

    // A serve failure ends the process with a non-zero exit code
    result?;
    info!("Shutdown complete");
    Ok(())
}
