//! Configuration infrastructure
//!
//! Configuration is layered with the `config` crate:
//! 1. Built-in defaults (the `defaults` module)
//! 2. An optional config file (TOML, JSON or YAML, by extension)
//! 3. Environment variables such as `HTML_PROBE__HTTP__USER_AGENT`

#![allow(clippy::derivable_impls)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to locate the user config directory")]
    NoConfigDir,
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener for the `serve` command
    pub server: ServerConfig,

    /// Outbound HTTP client settings
    pub http: HttpConfig,

    /// Streaming scan settings
    pub scan: ScanConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Whole-request timeout in seconds (headers and body)
    pub request_timeout_seconds: u64,

    pub connect_timeout_seconds: u64,

    /// Outbound request rate limit
    pub max_requests_per_second: u32,

    /// Maximum redirects to follow; 0 disables redirects
    pub max_redirects: usize,
}

/// Streaming scan settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Tags larger than this are replayed as text
    pub max_tag_bytes: usize,

    /// Deadline for one scan in seconds
    pub scan_timeout_seconds: u64,

    /// Stop `check` scans at the first collected fragment.
    /// Disabled by default so `contents` lists every fragment.
    pub check_early_termination: bool,

    /// Stop `compare` scans at the first fragment containing the expected text
    pub compare_early_termination: bool,

    /// Read buffer size for file and stdin sources
    pub read_buffer_bytes: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Log to stderr
    pub console_output: bool,

    /// Log to a file in `log_dir`
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    pub file_name: String,

    /// Per-target level overrides, e.g. "reqwest" -> "warn"
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            http: HttpConfig::default(),
            scan: ScanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            connect_timeout_seconds: defaults::CONNECT_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_redirects: defaults::MAX_REDIRECTS,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_tag_bytes: defaults::MAX_TAG_BYTES,
            scan_timeout_seconds: defaults::SCAN_TIMEOUT_SECONDS,
            check_early_termination: defaults::CHECK_EARLY_TERMINATION,
            compare_early_termination: defaults::COMPARE_EARLY_TERMINATION,
            read_buffer_bytes: defaults::READ_BUFFER_BYTES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl ScanConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_seconds)
    }
}

impl AppConfig {
    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Validation {
            message: message.to_string(),
        };

        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host must not be empty"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(invalid("http.user_agent must not be empty"));
        }
        if self.http.request_timeout_seconds == 0 {
            return Err(invalid("http.request_timeout_seconds must be greater than 0"));
        }
        if self.http.max_requests_per_second == 0 {
            return Err(invalid("http.max_requests_per_second must be greater than 0"));
        }
        if self.scan.max_tag_bytes == 0 {
            return Err(invalid("scan.max_tag_bytes must be greater than 0"));
        }
        if self.scan.scan_timeout_seconds == 0 {
            return Err(invalid("scan.scan_timeout_seconds must be greater than 0"));
        }
        if self.scan.read_buffer_bytes == 0 {
            return Err(invalid("scan.read_buffer_bytes must be greater than 0"));
        }
        if !self.logging.console_output && !self.logging.file_output {
            return Err(invalid("logging needs console_output or file_output"));
        }
        Ok(())
    }
}

/// Configuration loader
pub struct ConfigManager {
    config_path: PathBuf,
    /// An explicitly requested file must exist
    required: bool,
    env_overrides: Option<config::Map<String, String>>,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?.join("html-probe");
        Ok(config_dir)
    }

    /// Loader for the default, optional, per-user config file
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_dir()?.join("config.toml");
        Ok(Self {
            config_path,
            required: false,
            env_overrides: None,
        })
    }

    /// Loader for an explicit config file, which must exist
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            required: true,
            env_overrides: None,
        }
    }

    /// Replace the process environment with a fixed map (used by tests)
    pub fn with_env_overrides(mut self, vars: HashMap<String, String>) -> Self {
        self.env_overrides = Some(vars.into_iter().collect());
        self
    }

    /// Load, layer and validate the configuration
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(self.config_path.as_path()).required(self.required))
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(self.env_overrides.clone()),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        info!("Loaded configuration (file: {:?})", self.config_path);
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    /// Prefix for environment variable overrides
    pub const ENV_PREFIX: &str = "HTML_PROBE";

    pub const SERVER_HOST: &str = "0.0.0.0";

    pub const SERVER_PORT: u16 = 3000;

    pub const USER_AGENT: &str = concat!("html-probe/", env!("CARGO_PKG_VERSION"));

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const CONNECT_TIMEOUT_SECONDS: u64 = 10;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 10;

    pub const MAX_REDIRECTS: usize = 10;

    pub const MAX_TAG_BYTES: usize = 64 * 1024;

    pub const SCAN_TIMEOUT_SECONDS: u64 = 60;

    pub const CHECK_EARLY_TERMINATION: bool = false;

    pub const COMPARE_EARLY_TERMINATION: bool = true;

    pub const READ_BUFFER_BYTES: usize = 8 * 1024;

    // Log configuration defaults
    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = false;

    pub const LOG_FILE_NAME: &str = "html-probe.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.scan.check_early_termination);
        assert!(config.scan.compare_early_termination);
        assert_eq!(config.server.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_environment_sets_server_port() {
        let env = HashMap::from([("HTML_PROBE__SERVER__PORT".to_string(), "8080".to_string())]);
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::with_path(dir.path().join("config.toml")).with_env_overrides(env);
        manager.required = false;

        let config = manager.load().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, defaults::SERVER_HOST);
    }

    #[test]
    fn test_validation_rejects_zero_rate() {
        let mut config = AppConfig::default();
        config.http.max_requests_per_second = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[scan]\nscan_timeout_seconds = 5\n\n[http]\nuser_agent = \"probe-test\"").unwrap();

        let config = ConfigManager::with_path(file.path())
            .with_env_overrides(HashMap::new())
            .load()
            .unwrap();

        assert_eq!(config.scan.scan_timeout_seconds, 5);
        assert_eq!(config.scan.max_tag_bytes, defaults::MAX_TAG_BYTES);
        assert_eq!(config.http.user_agent, "probe-test");
        assert_eq!(config.http.request_timeout_seconds, defaults::REQUEST_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[http]\nmax_requests_per_second = 3").unwrap();

        let env = HashMap::from([
            ("HTML_PROBE__HTTP__MAX_REQUESTS_PER_SECOND".to_string(), "7".to_string()),
            ("HTML_PROBE__SCAN__CHECK_EARLY_TERMINATION".to_string(), "true".to_string()),
        ]);
        let config = ConfigManager::with_path(file.path())
            .with_env_overrides(env)
            .load()
            .unwrap();

        assert_eq!(config.http.max_requests_per_second, 7);
        assert!(config.scan.check_early_termination);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigManager::with_path(dir.path().join("absent.toml"))
            .with_env_overrides(HashMap::new())
            .load();
        assert!(matches!(result, Err(ConfigError::FileLoad { .. })));
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"scan": {{"max_tag_bytes": 0}}}}"#).unwrap();

        let result = ConfigManager::with_path(file.path())
            .with_env_overrides(HashMap::new())
            .load();
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }
}
