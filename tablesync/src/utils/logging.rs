//! Logging utilities for tablesync
//!
//! This module provides logging setup and configuration.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Parse a configured level name, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging based on configuration
pub fn init_logging(config: &Option<LoggingConfig>) -> Result<()> {
    let config = match config {
        Some(cfg) => cfg,
        None => return Ok(()), // No logging configuration, leave the host's subscriber alone
    };

    let level = parse_level(&config.level);
    let directive = format!("tablesync={}", level)
        .parse()
        .map_err(|e| Error::ConfigError(format!("Invalid log directive: {}", e)))?;
    let env_filter = EnvFilter::from_default_env().add_directive(directive);
    let json = config.format.eq_ignore_ascii_case("json");

    let installed = if let Some(file_path) = &config.file {
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(file_path)?;
        let file = Mutex::new(file);

        if json {
            tracing::subscriber::set_global_default(
                fmt::Subscriber::builder()
                    .json()
                    .with_env_filter(env_filter)
                    .with_writer(file)
                    .finish(),
            )
        } else {
            tracing::subscriber::set_global_default(
                fmt::Subscriber::builder()
                    .with_env_filter(env_filter)
                    .with_writer(file)
                    .with_ansi(false)
                    .finish(),
            )
        }
    } else if config.stdout {
        if json {
            tracing::subscriber::set_global_default(
                fmt::Subscriber::builder()
                    .json()
                    .with_env_filter(env_filter)
                    .finish(),
            )
        } else {
            tracing::subscriber::set_global_default(
                fmt::Subscriber::builder().with_env_filter(env_filter).finish(),
            )
        }
    } else {
        return Ok(());
    };

    installed.map_err(|e| Error::ConfigError(format!("Failed to install logger: {}", e)))
}
