//! End-to-end probe tests against a local mock HTTP server

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use html_probe_lib::application::{CheckRequest, CompareRequest, ProbeResponse, ProbeService, ResponseBody};
use html_probe_lib::domain::ProbeOutcome;
use html_probe_lib::infrastructure::config::{AppConfig, ScanConfig};
use html_probe_lib::infrastructure::http_client::{FetchError, PageFetcher};
use html_probe_lib::infrastructure::streaming::{ChunkSource, ScanMode, SourceError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TITLE_PAGE: &str = "<html><body><h1>  Title  </h1></body></html>";
const PRICE_PAGE: &str = "<html><body><p>Price: $10</p><p>Price: $20</p></body></html>";

async fn serve(page_path: &str, status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn service() -> ProbeService {
    ProbeService::from_config(&AppConfig::default()).unwrap()
}

fn check_request(server: &MockServer, page_path: &str, selector: &str) -> CheckRequest {
    CheckRequest {
        url: format!("{}{}", server.uri(), page_path),
        selector: selector.to_string(),
    }
}

fn body_json(response: &ProbeResponse) -> Value {
    serde_json::from_str(&response.to_json().unwrap()).unwrap()
}

#[tokio::test]
async fn check_returns_trimmed_contents() {
    let server = serve("/page", 200, TITLE_PAGE).await;
    let response = service()
        .check(&check_request(&server, "/page", "h1"), &CancellationToken::new())
        .await;

    assert_eq!(response.status, 200);
    let body = body_json(&response);
    assert_eq!(body["status"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["contents"], serde_json::json!(["Title"]));
    assert!(body["timestamp"].as_str().is_some_and(|ts| ts.ends_with('Z')));
}

#[tokio::test]
async fn check_reports_missing_element() {
    let server = serve("/page", 200, TITLE_PAGE).await;
    let response = service()
        .check(&check_request(&server, "/page", ".missing"), &CancellationToken::new())
        .await;

    assert_eq!(response, ProbeResponse::error(404, "Element not found"));
}

#[tokio::test]
async fn compare_returns_first_matching_fragment() {
    let server = serve("/prices", 200, PRICE_PAGE).await;
    let request = CompareRequest {
        url: format!("{}/prices", server.uri()),
        selector: "p".to_string(),
        expected_content: "$20".to_string(),
    };
    let response = service().compare(&request, &CancellationToken::new()).await;

    assert_eq!(response.status, 200);
    match response.body {
        ResponseBody::Matched { matched_content, .. } => assert_eq!(matched_content, "Price: $20"),
        other => panic!("unexpected body: {other:?}"),
    }
}

#[tokio::test]
async fn compare_reports_missing_content() {
    let server = serve("/prices", 200, PRICE_PAGE).await;
    let request = CompareRequest {
        url: format!("{}/prices", server.uri()),
        selector: "p".to_string(),
        expected_content: "$30".to_string(),
    };
    let response = service().compare(&request, &CancellationToken::new()).await;

    assert_eq!(response, ProbeResponse::error(404, "Content not found"));
}

#[tokio::test]
async fn upstream_error_status_is_internal_error() {
    let server = serve("/gone", 503, "<h1>Service Unavailable</h1>").await;
    let response = service()
        .check(&check_request(&server, "/gone", "h1"), &CancellationToken::new())
        .await;

    assert_eq!(response, ProbeResponse::error(500, "Internal server error"));
}

#[tokio::test]
async fn unreachable_upstream_is_internal_error() {
    let server = MockServer::start().await;
    let url = format!("{}/page", server.uri());
    drop(server);

    let request = CheckRequest {
        url,
        selector: "h1".to_string(),
    };
    let response = service().check(&request, &CancellationToken::new()).await;
    assert_eq!(response.status, 500);
}

#[tokio::test]
async fn invalid_selector_is_rejected_before_fetch() {
    let server = serve("/page", 200, TITLE_PAGE).await;
    let response = service()
        .check(&check_request(&server, "/page", "h1:first-child"), &CancellationToken::new())
        .await;

    assert_eq!(response, ProbeResponse::error(400, "Invalid selector provided"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

/// Fetcher that only counts calls
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for CountingFetcher {
    async fn fetch(&self, url: &Url, _cancel: &CancellationToken) -> Result<Box<dyn ChunkSource>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Request {
            url: url.to_string(),
            message: "fetch should not happen".to_string(),
        })
    }
}

#[tokio::test]
async fn invalid_url_fails_before_any_fetch() {
    let fetcher = Arc::new(CountingFetcher {
        calls: AtomicUsize::new(0),
    });
    let service = ProbeService::new(fetcher.clone(), ScanConfig::default());
    let request = CheckRequest {
        url: "not-a-url".to_string(),
        selector: "h1".to_string(),
    };

    let response = service.check(&request, &CancellationToken::new()).await;

    assert_eq!(response.status, 400);
    assert_eq!(body_json(&response), serde_json::json!({"status": 400, "error": "Invalid URL provided"}));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_probe_is_internal_error() {
    let server = serve("/page", 200, TITLE_PAGE).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = service().check(&check_request(&server, "/page", "h1"), &cancel).await;
    assert_eq!(response, ProbeResponse::error(500, "Internal server error"));
}

#[tokio::test]
async fn compare_finds_match_at_start_of_large_page() {
    let mut page = String::from("<html><body><p>Price: $20</p>");
    for i in 0..20_000 {
        page.push_str(&format!("<p>filler {i}</p>"));
    }
    page.push_str("</body></html>");
    let server = serve("/large", 200, &page).await;

    let request = CompareRequest {
        url: format!("{}/large", server.uri()),
        selector: "p".to_string(),
        expected_content: "price".to_string(),
    };
    let response = service().compare(&request, &CancellationToken::new()).await;

    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response)["matchedContent"], "Price: $20");
}

const FILLER_CHUNKS: usize = 500;

/// Source that records how many chunks were pulled and fails once the
/// filler runs out
struct CountingSource {
    chunks: VecDeque<Bytes>,
    pulls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChunkSource for CountingSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, SourceError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None => Err(SourceError::new("connection reset after filler")),
        }
    }
}

fn price_then_filler(pulls: Arc<AtomicUsize>) -> CountingSource {
    let mut chunks = VecDeque::with_capacity(FILLER_CHUNKS + 1);
    chunks.push_back(Bytes::from_static(b"<html><body><p>Price: $20</p>"));
    for i in 0..FILLER_CHUNKS {
        chunks.push_back(Bytes::from(format!("<p>filler {i}</p>")));
    }
    CountingSource { chunks, pulls }
}

/// Fetcher handing out a fresh `price_then_filler` source per request
struct FillerFetcher {
    pulls: Arc<AtomicUsize>,
}

#[async_trait]
impl PageFetcher for FillerFetcher {
    async fn fetch(&self, _url: &Url, _cancel: &CancellationToken) -> Result<Box<dyn ChunkSource>, FetchError> {
        Ok(Box::new(price_then_filler(self.pulls.clone())))
    }
}

#[tokio::test]
async fn compare_stops_pulling_chunks_after_match() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let service = ProbeService::new(Arc::new(FillerFetcher { pulls: pulls.clone() }), ScanConfig::default());
    let request = CompareRequest {
        url: "http://shop.test/large".to_string(),
        selector: "p".to_string(),
        expected_content: "price".to_string(),
    };

    let response = service.compare(&request, &CancellationToken::new()).await;

    // a full read would reach the trailing transport error and answer 500
    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response)["matchedContent"], "Price: $20");
    assert_eq!(pulls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn check_reads_past_first_match_by_default() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let service = ProbeService::new(Arc::new(FillerFetcher { pulls: pulls.clone() }), ScanConfig::default());
    let request = CheckRequest {
        url: "http://shop.test/large".to_string(),
        selector: "p".to_string(),
    };

    let response = service.check(&request, &CancellationToken::new()).await;

    assert_eq!(response, ProbeResponse::error(500, "Internal server error"));
    assert_eq!(pulls.load(Ordering::SeqCst), FILLER_CHUNKS + 2);
}

#[tokio::test]
async fn early_termination_report_covers_only_the_first_chunk() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let source = price_then_filler(pulls.clone());
    let first_chunk_len = source.chunks.front().map_or(0, Bytes::len) as u64;
    let total_len: u64 = source.chunks.iter().map(|chunk| chunk.len() as u64).sum();
    let mode = ScanMode::Contains {
        expected: "$20".to_string(),
    };

    let report = service()
        .extract(source, "p", &mode, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.terminated_early);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.bytes_consumed, first_chunk_len);
    assert!(report.bytes_consumed < total_len);
    assert_eq!(pulls.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.outcome(&mode),
        ProbeOutcome::Matched {
            matched_content: "Price: $20".to_string()
        }
    );
}
