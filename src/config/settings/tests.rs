use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.server.name, "wiljobagent");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.sse_path, "/sse/jobagent");
    assert_eq!(config.server.message_path, "/messages/");
    assert_eq!(config.server.keep_alive_interval(), Duration::from_secs(15));
    assert_eq!(config.logging.file, PathBuf::from("mcp_server.log"));
    assert_eq!(config.catalog.path, None);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.server.port = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidPort(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.server.host = "  ".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidHost(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.server.name = String::new();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidName(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.server.sse_path = "sse".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidPath(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.server.message_path = "/sse/jobagent".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::ConflictingPaths(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.server.keep_alive_secs = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidKeepAlive(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.logging.file = PathBuf::new();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidLogFile)
    ));

    let mut invalid_config = config;
    invalid_config.logging.level = "wil_job_agent=loud".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidLogLevel(_))
    ));
}

#[test]
fn urls_from_defaults() {
    let server = ServerConfig::default();
    assert_eq!(server.bind_address(), "127.0.0.1:8000");
    assert_eq!(server.sse_url(), "http://127.0.0.1:8000/sse/jobagent");
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = Config::from_toml_str(
        r#"
[server]
port = 9100

[catalog]
path = "jobs.toml"
"#,
    )
    .expect("should parse partial config");

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.sse_path, "/sse/jobagent");
    assert_eq!(config.catalog.path, Some(PathBuf::from("jobs.toml")));
    assert_eq!(config.logging, LoggingConfig::default());
}

#[test]
fn invalid_toml_values_are_rejected() {
    let result = Config::from_toml_str("[server]\nport = 0\n");
    assert!(matches!(result, Err(ConfigError::InvalidPort(0))));

    let result = Config::from_toml_str("[server]\nport = \"eighty\"\n");
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = config
        .to_toml_string()
        .expect("should serialize toml correctly");
    let parsed_config = Config::from_toml_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn load_without_path_uses_defaults() {
    let config = Config::load(None).expect("defaults should load");
    assert_eq!(config, Config::default());
}

#[test]
fn load_from_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[server]\nhost = \"0.0.0.0\"\n\n[logging]\nfile = \"agent.log\"\n",
    )
    .expect("should write config file");

    let config = Config::load(Some(&config_path)).expect("should load config file");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.logging.file, PathBuf::from("agent.log"));
}

#[test]
fn load_missing_file_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let missing = temp_dir.path().join("missing.toml");
    assert!(Config::load(Some(&missing)).is_err());
}
