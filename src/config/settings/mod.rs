#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub sse_path: String,
    pub message_path: String,
    /// Seconds between keep-alive comments on open event streams
    pub keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "wiljobagent".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            sse_path: "/sse/jobagent".to_string(),
            message_path: "/messages/".to_string(),
            keep_alive_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("mcp_server.log"),
            level: "info,wil_job_agent=debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// TOML catalog to serve instead of the built-in postings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server name: {0:?} (cannot be empty)")]
    InvalidName(String),
    #[error("Invalid host: {0:?} (cannot be empty)")]
    InvalidHost(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid route path: {0:?} (must start with '/')")]
    InvalidPath(String),
    #[error("SSE path and message path must differ (both are {0:?})")]
    ConflictingPaths(String),
    #[error("Invalid keep-alive interval: {0} (must be at least 1 second)")]
    InvalidKeepAlive(u64),
    #[error("Invalid log level directive: {0:?}")]
    InvalidLogLevel(String),
    #[error("Invalid log file path (cannot be empty)")]
    InvalidLogFile,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from an explicit file, or fall back to defaults
    #[inline]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    #[inline]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Render the effective configuration as TOML
    #[inline]
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        for path in [&self.sse_path, &self.message_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidPath(path.clone()));
            }
        }

        if self.sse_path == self.message_path {
            return Err(ConfigError::ConflictingPaths(self.sse_path.clone()));
        }

        if self.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidKeepAlive(self.keep_alive_secs));
        }

        Ok(())
    }

    /// Socket address string handed to the TCP listener
    #[inline]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval between keep-alive comments on SSE streams
    #[inline]
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Public URL of the SSE endpoint, as announced in the startup banner
    #[inline]
    pub fn sse_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.sse_path)
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file.as_os_str().is_empty() {
            return Err(ConfigError::InvalidLogFile);
        }

        if EnvFilter::try_new(&self.level).is_err() {
            return Err(ConfigError::InvalidLogLevel(self.level.clone()));
        }

        Ok(())
    }
}
