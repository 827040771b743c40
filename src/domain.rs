//! Domain module - selectors and extraction results
//!
//! Pure types with no I/O: the selector model the matcher evaluates and
//! the result values a scan hands back to its caller.

pub mod extraction;
pub mod selector;

pub use extraction::{ExtractionResult, ProbeOutcome};
pub use selector::{ElementView, Selector, SelectorError};
