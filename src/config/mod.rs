// Configuration management module
// Handles the optional TOML configuration file and its defaults

pub mod settings;

pub use settings::{CatalogConfig, Config, ConfigError, LoggingConfig, ServerConfig};
