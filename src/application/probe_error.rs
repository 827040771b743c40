//! Error taxonomy for probe requests
//!
//! Every variant maps to an HTTP-style status and a fixed public message;
//! internal details stay in the logs.

use thiserror::Error;

use crate::domain::SelectorError;
use crate::infrastructure::http_client::FetchError;
use crate::infrastructure::streaming::ScanError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(#[from] FetchError),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
}

impl ProbeError {
    pub fn invalid_url(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    /// Status code reported to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidSelector(_) => 400,
            Self::UpstreamFetch(_) | Self::Scan(_) => 500,
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "Invalid URL provided",
            Self::InvalidSelector(_) => "Invalid selector provided",
            Self::UpstreamFetch(_) | Self::Scan(_) => "Internal server error",
        }
    }

    /// Client mistakes, as opposed to upstream or stream faults
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
