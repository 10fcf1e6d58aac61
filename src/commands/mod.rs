//! CLI command implementations for function-instance-control.
//!
//! - `config`: Configuration file generation

pub mod config;

pub use config::command_config;
