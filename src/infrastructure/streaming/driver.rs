//! Scan driver: source -> tokenizer -> matcher -> collector
//!
//! [`ScanEngine`] is the synchronous pipeline for one scan. [`scan_stream`]
//! wraps it in the async pull loop; the only suspension point is waiting
//! for the next chunk, and a chunk is fully drained before the next one is
//! requested.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::domain::extraction::fragment_contains;
use crate::domain::{ExtractionResult, ProbeOutcome, Selector};

use super::collector::ExtractionCollector;
use super::error::ScanError;
use super::matcher::SelectorMatcher;
use super::source::ChunkSource;
use super::token::Token;
use super::tokenizer::{DEFAULT_MAX_TAG_BYTES, Tokenizer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// Does the selector match any non-whitespace content?
    Existence,
    /// Does any matched fragment contain `expected`, ignoring case?
    Contains { expected: String },
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Stop pulling chunks once the mode's condition is satisfied
    pub early_termination: bool,
    pub max_tag_bytes: usize,
    /// Deadline for the whole scan, checked while waiting for chunks
    pub timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            early_termination: true,
            max_tag_bytes: DEFAULT_MAX_TAG_BYTES,
            timeout: None,
        }
    }
}

/// Result of a completed scan plus stream statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub result: ExtractionResult,
    pub bytes_consumed: u64,
    pub chunks: u64,
    pub terminated_early: bool,
    pub max_depth: usize,
}

impl ScanReport {
    pub fn outcome(&self, mode: &ScanMode) -> ProbeOutcome {
        match mode {
            ScanMode::Existence if self.result.found() => ProbeOutcome::Found {
                contents: self.result.fragments.clone(),
            },
            ScanMode::Existence => ProbeOutcome::NoMatch,
            ScanMode::Contains { expected } => match self.result.first_containing(expected) {
                Some(fragment) => ProbeOutcome::Matched {
                    matched_content: fragment.to_string(),
                },
                None => ProbeOutcome::NoMatch,
            },
        }
    }
}

/// Synchronous single-scan pipeline
#[derive(Debug)]
pub struct ScanEngine<'s> {
    tokenizer: Tokenizer,
    matcher: SelectorMatcher<'s>,
    collector: ExtractionCollector,
    /// Lowercased needle in comparison mode
    needle: Option<String>,
    early_termination: bool,
    satisfied: bool,
    chunks: u64,
}

impl<'s> ScanEngine<'s> {
    pub fn new(selector: &'s Selector, mode: &ScanMode, options: &ScanOptions) -> Self {
        let needle = match mode {
            ScanMode::Existence => None,
            ScanMode::Contains { expected } => Some(expected.to_lowercase()),
        };

        Self {
            tokenizer: Tokenizer::with_max_tag_bytes(options.max_tag_bytes),
            matcher: SelectorMatcher::new(selector),
            collector: ExtractionCollector::new(),
            needle,
            early_termination: options.early_termination,
            satisfied: false,
            chunks: 0,
        }
    }

    /// Run one chunk through the pipeline.
    ///
    /// Returns `true` once the scan may stop. With early termination the
    /// tokens after the satisfying fragment are discarded, so the collected
    /// fragments do not depend on chunk boundaries.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> bool {
        if self.is_done() {
            return true;
        }
        self.chunks += 1;
        let tokens = self.tokenizer.feed(chunk);
        self.process(tokens);
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.early_termination && self.satisfied
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.tokenizer.bytes_fed()
    }

    pub fn fragments_collected(&self) -> usize {
        self.collector.fragment_count()
    }

    /// Flush the tokenizer (unless already terminated) and produce the report
    pub fn finish(mut self) -> ScanReport {
        let terminated_early = self.is_done();
        if !terminated_early {
            let tokens = self.tokenizer.finish();
            self.process(tokens);
        }

        ScanReport {
            bytes_consumed: self.tokenizer.bytes_fed(),
            chunks: self.chunks,
            terminated_early,
            max_depth: self.matcher.max_depth(),
            result: self.collector.into_result(),
        }
    }

    fn process(&mut self, tokens: Vec<Token>) {
        for token in tokens {
            if self.is_done() {
                break;
            }
            match token {
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    let decision = self.matcher.on_start_tag(&name, &attributes, self_closing);
                    if decision.is_matched() {
                        self.collector.on_element_matched();
                    }
                }
                Token::EndTag { name } => self.matcher.on_end_tag(&name),
                Token::Text(raw) => {
                    if !self.matcher.in_matched_scope() {
                        continue;
                    }
                    if let Some(fragment) = self.collector.on_text(&raw) {
                        let qualifies = match &self.needle {
                            None => true,
                            Some(needle) => fragment_contains(fragment, needle),
                        };
                        self.satisfied |= qualifies;
                    }
                }
            }
        }
    }
}

/// Scan a fully buffered document, optionally split into chunks
pub fn scan_chunks<'a, I>(chunks: I, selector: &Selector, mode: &ScanMode, options: &ScanOptions) -> ScanReport
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut engine = ScanEngine::new(selector, mode, options);
    for chunk in chunks {
        if engine.push_chunk(chunk) {
            break;
        }
    }
    engine.finish()
}

/// Drive a scan over a live byte stream.
///
/// The source is owned by the scan and dropped on every exit path. A
/// transport error, timeout or cancellation is an error, never a partial
/// result.
pub async fn scan_stream<S: ChunkSource>(
    mut source: S,
    selector: &Selector,
    mode: &ScanMode,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScanError> {
    let deadline = options.timeout.map(|timeout| Instant::now() + timeout);
    let mut engine = ScanEngine::new(selector, mode, options);

    loop {
        let bytes_consumed = engine.bytes_consumed();
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(bytes_consumed, "scan cancelled");
                return Err(ScanError::Cancelled { bytes_consumed });
            }
            next = next_chunk_before(&mut source, deadline, bytes_consumed) => next,
        };

        match next {
            Ok(Some(chunk)) => {
                trace!(chunk_len = chunk.len(), "scanning chunk");
                if engine.push_chunk(&chunk) {
                    debug!(bytes_consumed = engine.bytes_consumed(), "scan condition satisfied, stopping early");
                    break;
                }
            }
            Ok(None) => break,
            Err(ScanError::StreamInterrupted { message, .. }) => {
                return Err(ScanError::StreamInterrupted {
                    bytes_consumed,
                    fragments_collected: engine.fragments_collected(),
                    message,
                });
            }
            Err(err) => return Err(err),
        }
    }
    drop(source);

    let report = engine.finish();
    debug!(
        bytes = report.bytes_consumed,
        chunks = report.chunks,
        fragments = report.result.fragments.len(),
        matched = report.result.matched,
        terminated_early = report.terminated_early,
        "scan finished"
    );
    Ok(report)
}

async fn next_chunk_before<S: ChunkSource + ?Sized>(
    source: &mut S,
    deadline: Option<Instant>,
    bytes_consumed: u64,
) -> Result<Option<Bytes>, ScanError> {
    let chunk = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, source.next_chunk())
            .await
            .map_err(|_| ScanError::TimedOut { bytes_consumed })?,
        None => source.next_chunk().await,
    };

    chunk.map_err(|err| ScanError::StreamInterrupted {
        bytes_consumed,
        fragments_collected: 0,
        message: err.to_string(),
    })
}
