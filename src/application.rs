//! Application layer module
//!
//! Probe use cases and the request/response DTOs that wrap them.

pub mod dto;
pub mod probe_error;
pub mod probe_service;

pub use dto::{CheckRequest, CompareRequest, ProbeResponse, ResponseBody};
pub use probe_error::ProbeError;
pub use probe_service::ProbeService;
