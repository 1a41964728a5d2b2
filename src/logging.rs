//! Tracing subscriber setup
//!
//! The server appends its events to the configured log file so that stdout
//! stays free for the startup banner and the stdio transport. One-shot CLI
//! commands log to stderr and never touch the log file.

use crate::config::LoggingConfig;
use anyhow::{Context, Result, anyhow};
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber writing to the log file
#[inline]
pub fn init(config: &LoggingConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("Failed to open log file: {}", config.file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Install the global tracing subscriber writing to stderr
#[inline]
pub fn init_console(config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level directive: {}", config.level))
}
