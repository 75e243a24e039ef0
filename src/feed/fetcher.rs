use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, LOCATION};
use reqwest::{redirect, StatusCode};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::guard::{AddressGuard, BlockedTarget, GuardError, HostResolver, PinnedResolver, SystemResolver};
use crate::util::UrlValidationError;

const DEFAULT_MAX_FEED_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed.
///
/// Covers the SSRF policy, the transport, HTTP status handling and the body
/// size limit. [`FetchError::kind`] maps each variant onto the coarse failure
/// kind reported to callers.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Target refused by the address policy (never retried)
    #[error("Blocked: {0}")]
    Blocked(#[from] BlockedTarget),
    /// DNS resolution failed
    #[error("DNS lookup for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },
    /// Network-level error (connection, TLS, reset)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The attempt exceeded its timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with a non-success status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Redirect response without a usable `Location` header
    #[error("HTTP {0} redirect without Location header")]
    MissingLocation(u16),
    /// Redirect chain longer than the configured cap
    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),
    /// Response body exceeded the size limit
    #[error("Response too large (limit {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Coarse failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Blocked,
    Timeout,
    NetworkError,
    HttpError,
    TooManyRedirects,
    ResponseTooLarge,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Blocked(_) => FetchErrorKind::Blocked,
            FetchError::Timeout => FetchErrorKind::Timeout,
            FetchError::Dns { .. } | FetchError::Network(_) | FetchError::IncompleteResponse { .. } => {
                FetchErrorKind::NetworkError
            }
            FetchError::HttpStatus(_) | FetchError::MissingLocation(_) => FetchErrorKind::HttpError,
            FetchError::TooManyRedirects(_) => FetchErrorKind::TooManyRedirects,
            FetchError::ResponseTooLarge(_) => FetchErrorKind::ResponseTooLarge,
        }
    }

    /// 5xx, timeouts and transport failures are retried; everything else is
    /// terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::HttpStatus(status) => *status >= 500,
            FetchError::Timeout
            | FetchError::Dns { .. }
            | FetchError::Network(_)
            | FetchError::IncompleteResponse { .. } => true,
            _ => false,
        }
    }
}

impl From<GuardError> for FetchError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Blocked(blocked) => FetchError::Blocked(blocked),
            GuardError::Resolve { host, source } => FetchError::Dns { host, source },
        }
    }
}

/// Per-call fetch parameters.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Validator from the previous successful fetch, sent as `If-None-Match`.
    pub etag: Option<String>,
    /// Validator from the previous successful fetch, sent as `If-Modified-Since`.
    pub last_modified: Option<String>,
    /// Budget for a single attempt, redirects included.
    pub timeout: Duration,
    /// Additional attempts after the first.
    pub retries: u32,
    pub max_redirects: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            etag: None,
            last_modified: None,
            timeout: Duration::from_secs(20),
            retries: 2,
            max_redirects: 5,
        }
    }
}

impl FetchOptions {
    /// Same limits, with the given cache validators.
    pub fn with_validators(&self, etag: Option<String>, last_modified: Option<String>) -> Self {
        Self {
            etag,
            last_modified,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// URL after following redirects.
    pub final_url: Url,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok(FetchedBody),
    /// 304 response. Validators fall back to the request's when the server
    /// omits them.
    NotModified {
        etag: Option<String>,
        last_modified: Option<String>,
        final_url: Url,
    },
}

/// Network boundary used by the ingest pipeline.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome, FetchError>;
}

/// Client-wide settings for [`SafeFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub allowed_private_hosts: Vec<String>,
    pub max_feed_bytes: usize,
    /// Base delay for exponential backoff between attempts.
    pub retry_backoff: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("feedward/", env!("CARGO_PKG_VERSION")).to_string(),
            allowed_private_hosts: Vec::new(),
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// SSRF-safe HTTP fetcher with conditional GET, manual redirect handling and
/// retry with jittered exponential backoff.
///
/// Every hop is checked by an [`AddressGuard`] before it is requested, and the
/// same guard backs the client's DNS resolver so the connection itself can
/// only reach addresses that passed the policy.
#[derive(Clone)]
pub struct SafeFetcher {
    client: reqwest::Client,
    guard: Arc<AddressGuard>,
    max_body_bytes: usize,
    retry_backoff: Duration,
}

impl SafeFetcher {
    pub fn new(config: &FetcherConfig, resolver: Arc<dyn HostResolver>) -> Result<Self, FetchError> {
        let guard = Arc::new(AddressGuard::new(resolver, &config.allowed_private_hosts));
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .dns_resolver(Arc::new(PinnedResolver::new(Arc::clone(&guard))))
            .build()?;

        Ok(Self {
            client,
            guard,
            max_body_bytes: config.max_feed_bytes,
            retry_backoff: config.retry_backoff,
        })
    }

    /// Fetcher using the system resolver.
    pub fn with_system_resolver(config: &FetcherConfig) -> Result<Self, FetchError> {
        Self::new(config, Arc::new(SystemResolver))
    }

    async fn fetch_once(&self, start: &Url, options: &FetchOptions) -> Result<FetchOutcome, FetchError> {
        let mut current = start.clone();
        let mut hops = 0usize;

        loop {
            self.guard.check(&current).await?;

            let mut request = self.client.get(current.clone());
            if let Some(etag) = &options.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &options.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }

            let response = request.send().await.map_err(classify_send_error)?;
            let status = response.status();

            if status.is_redirection() && status != StatusCode::NOT_MODIFIED {
                let next = redirect_target(&current, &response)?;
                hops += 1;
                if hops > options.max_redirects {
                    return Err(FetchError::TooManyRedirects(options.max_redirects));
                }
                tracing::debug!(from = %current, to = %next, hop = hops, "Following redirect");
                current = next;
                continue;
            }

            let etag = header_value(&response, ETAG);
            let last_modified = header_value(&response, LAST_MODIFIED);

            if status == StatusCode::NOT_MODIFIED {
                return Ok(FetchOutcome::NotModified {
                    etag: etag.or_else(|| options.etag.clone()),
                    last_modified: last_modified.or_else(|| options.last_modified.clone()),
                    final_url: current,
                });
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let body = read_limited_bytes(response, self.max_body_bytes).await?;
            return Ok(FetchOutcome::Ok(FetchedBody {
                body,
                etag,
                last_modified,
                final_url: current,
                status: status.as_u16(),
            }));
        }
    }

    /// `base * 2^attempt` plus up to `base / 2` of jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_backoff.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter_ms = if base_ms >= 2 {
            rand::rng().random_range(0..=base_ms / 2)
        } else {
            0
        };
        Duration::from_millis(exp_ms.saturating_add(jitter_ms))
    }
}

#[async_trait]
impl FetchFeed for SafeFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome, FetchError> {
        let start = Url::parse(url).map_err(|e| BlockedTarget::from(UrlValidationError::from(e)))?;
        let mut attempt = 0u32;

        loop {
            let result = match tokio::time::timeout(options.timeout, self.fetch_once(&start, options)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < options.retries => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        url = %start,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!(url = %start, attempts = attempt + 1, error = %e, "Fetch failed");
                    return Err(e);
                }
                Ok(outcome) => return Ok(outcome),
            }
        }
    }
}

fn redirect_target(current: &Url, response: &reqwest::Response) -> Result<Url, FetchError> {
    let status = response.status().as_u16();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or(FetchError::MissingLocation(status))?;
    current
        .join(location.trim())
        .map_err(|e| BlockedTarget::from(UrlValidationError::from(e)).into())
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A refusal from the pinned resolver arrives wrapped inside reqwest's
/// connect error; surface it as `Blocked` rather than a network failure.
fn classify_send_error(err: reqwest::Error) -> FetchError {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(blocked) = cause.downcast_ref::<BlockedTarget>() {
            return FetchError::Blocked(blocked.clone());
        }
        source = cause.source();
    }
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err)
    }
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::guard::StaticResolver;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    fn fetcher_with(resolver: StaticResolver, allowed: &[&str], max_feed_bytes: usize) -> SafeFetcher {
        let config = FetcherConfig {
            allowed_private_hosts: allowed.iter().map(|h| h.to_string()).collect(),
            max_feed_bytes,
            retry_backoff: Duration::from_millis(5),
            ..FetcherConfig::default()
        };
        SafeFetcher::new(&config, Arc::new(resolver)).unwrap()
    }

    /// wiremock listens on 127.0.0.1, which only the allowlist lets through.
    fn local_fetcher() -> SafeFetcher {
        fetcher_with(StaticResolver::new(), &["127.0.0.1"], DEFAULT_MAX_FEED_BYTES)
    }

    fn options(retries: u32) -> FetchOptions {
        FetchOptions {
            retries,
            timeout: Duration::from_secs(5),
            ..FetchOptions::default()
        }
    }

    fn expect_ok(outcome: FetchOutcome) -> FetchedBody {
        match outcome {
            FetchOutcome::Ok(body) => body,
            other => panic!("Expected Ok, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body_and_validators() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("ETag", "\"v1\"")
                    .insert_header("Last-Modified", "Wed, 01 Jan 2025 00:00:00 GMT"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let body = expect_ok(local_fetcher().fetch(&url, &options(0)).await.unwrap());

        assert_eq!(body.body, VALID_RSS.as_bytes());
        assert_eq!(body.status, 200);
        assert_eq!(body.etag.as_deref(), Some("\"v1\""));
        assert_eq!(body.last_modified.as_deref(), Some("Wed, 01 Jan 2025 00:00:00 GMT"));
        assert_eq!(body.final_url.as_str(), url);
    }

    #[tokio::test]
    async fn test_conditional_get_not_modified() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("If-None-Match", "\"v1\""))
            .and(header("If-Modified-Since", "Wed, 01 Jan 2025 00:00:00 GMT"))
            .respond_with(ResponseTemplate::new(304).insert_header("ETag", "etag-304"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let opts = options(0).with_validators(
            Some("\"v1\"".into()),
            Some("Wed, 01 Jan 2025 00:00:00 GMT".into()),
        );
        let outcome = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &opts)
            .await
            .unwrap();

        match outcome {
            FetchOutcome::NotModified { etag, last_modified, .. } => {
                assert_eq!(etag.as_deref(), Some("etag-304"));
                // Server omitted Last-Modified; the request's validator is kept.
                assert_eq!(last_modified.as_deref(), Some("Wed, 01 Jan 2025 00:00:00 GMT"));
            }
            other => panic!("Expected NotModified, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_500_then_success_with_one_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &options(1))
            .await
            .unwrap();
        assert_eq!(expect_ok(outcome).status, 200);
    }

    #[tokio::test]
    async fn test_500_retries_exhausted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3) // Initial request + 2 retries
            .mount(&mock_server)
            .await;

        let err = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &options(2))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(503)));
        assert_eq!(err.kind(), FetchErrorKind::HttpError);
    }

    #[tokio::test]
    async fn test_404_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &options(3))
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_relative_redirect_followed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let outcome = local_fetcher()
            .fetch(&format!("{}/old", mock_server.uri()), &options(0))
            .await
            .unwrap();
        assert_eq!(expect_ok(outcome).final_url.path(), "/new");
    }

    #[tokio::test]
    async fn test_redirect_to_metadata_endpoint_blocked() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "http://169.254.169.254/latest/meta-data/"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &options(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Blocked);
    }

    #[tokio::test]
    async fn test_redirect_to_localhost_blocked() {
        let mock_server = MockServer::start().await;
        let port = mock_server.address().port();
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("http://localhost:{port}/internal").as_str()),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &options(0))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Blocked(_)));
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .expect(4) // Initial request + 3 hops
            .mount(&mock_server)
            .await;

        let opts = FetchOptions {
            max_redirects: 3,
            ..options(2)
        };
        let err = local_fetcher()
            .fetch(&format!("{}/loop", mock_server.uri()), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TooManyRedirects(3)));
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&mock_server)
            .await;

        let err = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &options(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::HttpError);
    }

    #[tokio::test]
    async fn test_hostname_resolving_to_loopback_blocked_without_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(0)
            .mount(&mock_server)
            .await;

        let resolver = StaticResolver::new().with_host("feeds.test", "127.0.0.1".parse().unwrap());
        let fetcher = fetcher_with(resolver, &[], DEFAULT_MAX_FEED_BYTES);
        let url = format!("http://feeds.test:{}/rss", mock_server.address().port());

        let err = fetcher.fetch(&url, &options(2)).await.unwrap_err();
        assert!(matches!(err, FetchError::Blocked(BlockedTarget::Address { .. })));
    }

    #[tokio::test]
    async fn test_allowlisted_hostname_connects_through_pinned_resolver() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resolver = StaticResolver::new().with_host("mirror.test", "127.0.0.1".parse().unwrap());
        let fetcher = fetcher_with(resolver, &["mirror.test"], DEFAULT_MAX_FEED_BYTES);
        let url = format!("http://mirror.test:{}/rss", mock_server.address().port());

        let outcome = fetcher.fetch(&url, &options(0)).await.unwrap();
        assert_eq!(expect_ok(outcome).body, VALID_RSS.as_bytes());
    }

    #[tokio::test]
    async fn test_unsupported_scheme_blocked() {
        let err = local_fetcher()
            .fetch("file:///etc/passwd", &options(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Blocked);
    }

    #[tokio::test]
    async fn test_response_too_large_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1000)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher_with(StaticResolver::new(), &["127.0.0.1"], 64);
        let err = fetcher
            .fetch(&format!("{}/feed", mock_server.uri()), &options(2))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge(64)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let opts = FetchOptions {
            timeout: Duration::from_millis(50),
            ..options(0)
        };
        let err = local_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()), &opts)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Timeout);
    }

    #[test]
    fn test_backoff_grows_exponentially_with_bounded_jitter() {
        let fetcher = fetcher_with(StaticResolver::new(), &[], DEFAULT_MAX_FEED_BYTES);
        let config_base = 5u64;
        for attempt in 0..4 {
            let delay = fetcher.backoff_delay(attempt).as_millis() as u64;
            let floor = config_base << attempt;
            assert!(delay >= floor && delay <= floor + config_base / 2, "attempt {attempt}: {delay}ms");
        }
    }
}
