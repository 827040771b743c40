//! Streaming scan error types

use thiserror::Error;

/// Failure reported by a byte stream source
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(format!("response body error: {err}"))
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("read error: {err}"))
    }
}

/// Ways a scan can end without a usable result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Byte stream interrupted after {bytes_consumed} bytes ({fragments_collected} fragments collected): {message}")]
    StreamInterrupted {
        bytes_consumed: u64,
        fragments_collected: usize,
        message: String,
    },

    #[error("Scan timed out after {bytes_consumed} bytes")]
    TimedOut { bytes_consumed: u64 },

    #[error("Scan cancelled after {bytes_consumed} bytes")]
    Cancelled { bytes_consumed: u64 },
}

impl ScanError {
    pub fn bytes_consumed(&self) -> u64 {
        match self {
            Self::StreamInterrupted { bytes_consumed, .. }
            | Self::TimedOut { bytes_consumed }
            | Self::Cancelled { bytes_consumed } => *bytes_consumed,
        }
    }
}
