//! html-probe - streaming CSS selector checks against remote HTML pages
//!
//! Fetches a page, scans the response body chunk by chunk with an
//! incremental tokenizer and an element-stack selector matcher, and
//! reports whether the selector matched content without buffering the
//! document.

// Module declarations
pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CheckRequest, CompareRequest, ProbeError, ProbeResponse, ProbeService};
pub use domain::{ExtractionResult, ProbeOutcome, Selector, SelectorError};
pub use infrastructure::{AppConfig, ConfigManager, ScanMode, ScanOptions, ScanReport};
