//! Infrastructure layer for page fetching, streaming scans, configuration and logging
//!
//! This module provides the HTTP client, the streaming HTML selector
//! engine, layered configuration and the tracing setup.

pub mod config; // Layered configuration (file + environment)
pub mod http_client; // Rate-limited page fetches
pub mod logging; // Logging infrastructure
pub mod streaming; // Incremental tokenizer, matcher and scan driver

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, ConfigManager, HttpConfig, LoggingConfig, ScanConfig, ServerConfig};
pub use http_client::{FetchError, HttpClient, PageFetcher};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use streaming::{ChunkSource, ScanError, ScanMode, ScanOptions, ScanReport, scan_chunks, scan_stream};
