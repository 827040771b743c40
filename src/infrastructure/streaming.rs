//! Streaming HTML selector extraction
//!
//! Scans an HTML byte stream chunk by chunk and collects the text of
//! elements matching a selector without buffering the document:
//! - `tokenizer`: resumable byte-level HTML tokenizer
//! - `matcher`: open-element stack with inherited match state
//! - `collector`: trimmed text fragments of matched scopes
//! - `driver`: the pull loop tying a `ChunkSource` to the pipeline

pub mod collector;
pub mod driver;
pub mod error;
pub mod matcher;
pub mod source;
pub mod token;
pub mod tokenizer;

pub use collector::ExtractionCollector;
pub use driver::{ScanEngine, ScanMode, ScanOptions, ScanReport, scan_chunks, scan_stream};
pub use error::{ScanError, SourceError};
pub use matcher::{MatchDecision, SelectorMatcher};
pub use source::{ChunkSource, StreamSource, chunked_source, reader_source};
pub use token::{Attribute, Token};
pub use tokenizer::Tokenizer;
