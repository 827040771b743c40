//! Logging system configuration and initialization
//!
//! - Console output to stderr (stdout carries the JSON responses)
//! - Optional file output through a non-blocking appender
//! - Optional structured JSON format
//! - `RUST_LOG` overrides the configured level

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the life of the process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Noisy dependency targets, suppressed unless the level is `trace`
const DEPENDENCY_DIRECTIVES: &[&str] = &["reqwest=info", "hyper=warn", "hyper_util=warn", "h2=warn", "tokio=info", "runtime=warn"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// UTC timestamps with millisecond precision
struct UtcMillisTimer;

impl FormatTime for UtcMillisTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Build the level filter for a configuration.
///
/// `RUST_LOG` wins when set. Otherwise the configured level applies, with
/// dependency chatter capped unless the level is `trace`, and per-module
/// overrides applied last.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level).with_context(|| format!("Invalid log level: {}", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for directive in DEPENDENCY_DIRECTIVES {
            filter = filter.add_directive(directive.parse()?);
        }
        filter = filter.add_directive(format!("html_probe_lib={}", config.level).parse()?);
    }

    for (module, level) in &config.module_filters {
        filter = filter.add_directive(
            format!("{module}={level}")
                .parse()
                .with_context(|| format!("Invalid module filter: {module}={level}"))?,
        );
    }

    Ok(filter)
}

/// Move a previous run's log file aside so each run starts a fresh file
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<()> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path).context("Failed to get log file metadata")?;
    let file_time = metadata.modified().unwrap_or_else(|_| std::time::SystemTime::now());
    let datetime: chrono::DateTime<Utc> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, datetime.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(())
}

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    if config.json_format {
        fmt::Layer::new()
            .json()
            .with_writer(std::io::stderr)
            .with_timer(UtcMillisTimer)
            .with_target(true)
            .boxed()
    } else {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(UtcMillisTimer)
            .with_target(false)
            .boxed()
    }
}

fn file_layer(config: &LoggingConfig, log_dir: &Path) -> Result<BoxedLayer> {
    std::fs::create_dir_all(log_dir).map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
    rotate_existing_log_file(log_dir, &config.file_name)?;

    let file_appender = rolling::never(log_dir, &config.file_name);
    let (file_writer, file_guard) = non_blocking(file_appender);

    LOG_GUARDS
        .lock()
        .map_err(|_| anyhow!("Log guard registry poisoned"))?
        .push(file_guard);

    let layer = if config.json_format {
        fmt::Layer::new()
            .json()
            .with_writer(file_writer)
            .with_timer(UtcMillisTimer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::Layer::new()
            .with_writer(file_writer)
            .with_timer(UtcMillisTimer)
            .with_target(false)
            .with_ansi(false)
            .boxed()
    };
    Ok(layer)
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = build_env_filter(config)?;
    let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.console_output {
        layers.push(console_layer(config));
    }
    if config.file_output {
        layers.push(file_layer(config, &log_dir)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    info!("JSON format: {}", config.json_format);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&config.file_name));
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== html-probe System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("=====================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_output);
        assert!(!config.file_output);
        assert!(!config.json_format);
    }

    #[test]
    fn test_build_env_filter_accepts_module_overrides() {
        let mut config = LoggingConfig::default();
        config.module_filters.insert("html_probe_lib::infrastructure".to_string(), "trace".to_string());
        assert!(build_env_filter(&config).is_ok());
    }

    #[test]
    fn test_rotate_existing_log_file_renames_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("probe.log"), "old run").unwrap();

        rotate_existing_log_file(dir.path(), "probe.log").unwrap();

        assert!(!dir.path().join("probe.log").exists());
        let rotated: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(rotated.len(), 1);
        assert!(rotated[0].starts_with("probe.") && rotated[0].ends_with(".log"));
    }

    #[test]
    fn test_rotate_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rotate_existing_log_file(dir.path(), "absent.log").is_ok());
    }

    #[test]
    fn test_no_output_is_rejected() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }
}
