//! Data Transfer Objects for probe requests and responses
//!
//! Field names follow the public JSON contract (`matchedContent`,
//! `expectedContent`).

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::probe_error::ProbeError;

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub url: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub url: String,
    pub selector: String,
    pub expected_content: String,
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Contents {
        status: u16,
        success: bool,
        contents: Vec<String>,
        timestamp: String,
    },
    Matched {
        status: u16,
        success: bool,
        #[serde(rename = "matchedContent")]
        matched_content: String,
        timestamp: String,
    },
    Error {
        status: u16,
        error: String,
    },
}

/// Status plus JSON body of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ProbeResponse {
    pub fn contents(contents: Vec<String>) -> Self {
        Self {
            status: 200,
            body: ResponseBody::Contents {
                status: 200,
                success: true,
                contents,
                timestamp: current_timestamp(),
            },
        }
    }

    pub fn matched(matched_content: String) -> Self {
        Self {
            status: 200,
            body: ResponseBody::Matched {
                status: 200,
                success: true,
                matched_content,
                timestamp: current_timestamp(),
            },
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Error {
                status,
                error: message.into(),
            },
        }
    }

    pub fn element_not_found() -> Self {
        Self::error(404, "Element not found")
    }

    pub fn content_not_found() -> Self {
        Self::error(404, "Content not found")
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.body)
    }
}

impl From<&ProbeError> for ProbeResponse {
    fn from(err: &ProbeError) -> Self {
        Self::error(err.status_code(), err.public_message())
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
