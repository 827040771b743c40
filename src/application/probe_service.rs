//! Probe use cases: fetch a page and scan it for a selector
//!
//! Validation order is URL, then selector, then fetch, so malformed
//! requests never cause network activity.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::{ProbeOutcome, Selector};
use crate::infrastructure::config::{AppConfig, ScanConfig};
use crate::infrastructure::http_client::{HttpClient, PageFetcher};
use crate::infrastructure::streaming::{ChunkSource, ScanMode, ScanOptions, ScanReport, scan_stream};

use super::dto::{CheckRequest, CompareRequest, ProbeResponse};
use super::probe_error::ProbeError;

/// Runs check and compare probes against remote pages
pub struct ProbeService {
    fetcher: Arc<dyn PageFetcher>,
    scan: ScanConfig,
}

impl ProbeService {
    pub fn new(fetcher: Arc<dyn PageFetcher>, scan: ScanConfig) -> Self {
        Self { fetcher, scan }
    }

    /// Build a service backed by the rate-limited HTTP client
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = HttpClient::new(config.http.clone())?;
        Ok(Self::new(Arc::new(client), config.scan.clone()))
    }

    /// Does `selector` match any non-whitespace content on the page?
    pub async fn check(&self, request: &CheckRequest, cancel: &CancellationToken) -> ProbeResponse {
        let span = info_span!("probe", op = "check", request_id = %Uuid::new_v4());
        async {
            info!("[check] Received request for URL: {} (selector: {})", request.url, request.selector);

            match self.run_check(&request.url, &request.selector, cancel).await {
                Ok(ProbeOutcome::Found { contents }) => {
                    info!("[check] Element found ({} fragments)", contents.len());
                    ProbeResponse::contents(contents)
                }
                Ok(_) => {
                    info!("[check] Element not found");
                    ProbeResponse::element_not_found()
                }
                Err(err) => error_response("check", &err),
            }
        }
        .instrument(span)
        .await
    }

    /// Does any matched fragment contain the expected text, ignoring case?
    pub async fn compare(&self, request: &CompareRequest, cancel: &CancellationToken) -> ProbeResponse {
        let span = info_span!("probe", op = "compare", request_id = %Uuid::new_v4());
        async {
            info!(
                "[compare] Received request for URL: {} (selector: {}, expected: {:?})",
                request.url, request.selector, request.expected_content
            );

            match self
                .run_compare(&request.url, &request.selector, &request.expected_content, cancel)
                .await
            {
                Ok(ProbeOutcome::Matched { matched_content }) => {
                    info!("[compare] Content matched");
                    ProbeResponse::matched(matched_content)
                }
                Ok(_) => {
                    info!("[compare] Content not found");
                    ProbeResponse::content_not_found()
                }
                Err(err) => error_response("compare", &err),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn run_check(&self, url: &str, selector: &str, cancel: &CancellationToken) -> Result<ProbeOutcome, ProbeError> {
        let mode = ScanMode::Existence;
        let report = self.probe(url, selector, &mode, cancel).await?;
        Ok(report.outcome(&mode))
    }

    pub async fn run_compare(
        &self,
        url: &str,
        selector: &str,
        expected: &str,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, ProbeError> {
        let mode = ScanMode::Contains {
            expected: expected.to_string(),
        };
        let report = self.probe(url, selector, &mode, cancel).await?;
        Ok(report.outcome(&mode))
    }

    /// Scan an already open byte source (file, stdin) with the configured options
    pub async fn extract<S: ChunkSource>(
        &self,
        source: S,
        selector: &str,
        mode: &ScanMode,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ProbeError> {
        let selector = Selector::parse(selector)?;
        let report = scan_stream(source, &selector, mode, &self.scan_options(mode), cancel).await?;
        Ok(report)
    }

    /// Scan options for a mode: early termination per mode, configured limits
    pub fn scan_options(&self, mode: &ScanMode) -> ScanOptions {
        let early_termination = match mode {
            ScanMode::Existence => self.scan.check_early_termination,
            ScanMode::Contains { .. } => self.scan.compare_early_termination,
        };
        ScanOptions {
            early_termination,
            max_tag_bytes: self.scan.max_tag_bytes,
            timeout: Some(self.scan.scan_timeout()),
        }
    }

    async fn probe(&self, url: &str, selector: &str, mode: &ScanMode, cancel: &CancellationToken) -> Result<ScanReport, ProbeError> {
        let url = parse_url(url)?;
        let selector = Selector::parse(selector)?;

        let source = self.fetcher.fetch(&url, cancel).await?;
        let report = scan_stream(source, &selector, mode, &self.scan_options(mode), cancel).await?;

        debug!(
            bytes = report.bytes_consumed,
            chunks = report.chunks,
            fragments = report.result.fragments.len(),
            max_depth = report.max_depth,
            terminated_early = report.terminated_early,
            "scan complete"
        );
        Ok(report)
    }
}

/// Parse an absolute URL
pub fn parse_url(input: &str) -> Result<Url, ProbeError> {
    Url::parse(input).map_err(|e| ProbeError::invalid_url(input, e))
}

fn error_response(op: &str, err: &ProbeError) -> ProbeResponse {
    if err.is_client_error() {
        warn!("[{}] Rejected request: {}", op, err);
    } else {
        error!("[{}] Error: {}", op, err);
    }
    ProbeResponse::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::FetchError;
    use crate::infrastructure::streaming::chunked_source;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed document split into chunks and counts fetches
    struct StaticFetcher {
        chunks: Vec<Vec<u8>>,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(chunks: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url, _cancel: &CancellationToken) -> Result<Box<dyn ChunkSource>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(chunked_source(self.chunks.clone())))
        }
    }

    fn service(fetcher: Arc<StaticFetcher>) -> ProbeService {
        ProbeService::new(fetcher, ScanConfig::default())
    }

    #[tokio::test]
    async fn test_check_returns_all_fragments() {
        let fetcher = StaticFetcher::new(&["<ul><li>a</li>", "<li> b </li></ul>"]);
        let response = service(fetcher)
            .run_check("https://example.com", "li", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            response,
            ProbeOutcome::Found {
                contents: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_url_skips_fetch() {
        let fetcher = StaticFetcher::new(&["<h1>x</h1>"]);
        let svc = service(fetcher.clone());
        let request = CheckRequest {
            url: "not-a-url".to_string(),
            selector: "h1".to_string(),
        };

        let response = svc.check(&request, &CancellationToken::new()).await;
        assert_eq!(response, ProbeResponse::error(400, "Invalid URL provided"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_selector_skips_fetch() {
        let fetcher = StaticFetcher::new(&["<h1>x</h1>"]);
        let svc = service(fetcher.clone());
        let request = CheckRequest {
            url: "https://example.com".to_string(),
            selector: "div > p".to_string(),
        };

        let response = svc.check(&request, &CancellationToken::new()).await;
        assert_eq!(response, ProbeResponse::error(400, "Invalid selector provided"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compare_is_case_insensitive() {
        let fetcher = StaticFetcher::new(&["<p class=\"price\">Price: $10</p><p class=\"price\">SALE today</p>"]);
        let outcome = service(fetcher)
            .run_compare("https://example.com", ".price", "sale", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ProbeOutcome::Matched {
                matched_content: "SALE today".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_whitespace_only_match_is_not_found() {
        let fetcher = StaticFetcher::new(&["<div class=\"empty\">   \n  </div>"]);
        let svc = service(fetcher);
        let request = CheckRequest {
            url: "https://example.com".to_string(),
            selector: ".empty".to_string(),
        };
        let response = svc.check(&request, &CancellationToken::new()).await;
        assert_eq!(response, ProbeResponse::element_not_found());
    }

    #[test]
    fn test_scan_options_follow_mode() {
        let svc = service(StaticFetcher::new(&[]));
        assert!(!svc.scan_options(&ScanMode::Existence).early_termination);
        let contains = ScanMode::Contains {
            expected: "x".to_string(),
        };
        assert!(svc.scan_options(&contains).early_termination);
        assert_eq!(
            svc.scan_options(&contains).timeout,
            Some(ScanConfig::default().scan_timeout())
        );
    }
}
