use serde::Serialize;

use crate::feed::FetchErrorKind;

/// Machine-readable failure code reported per feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Blocked,
    Timeout,
    NetworkError,
    HttpError,
    TooManyRedirects,
    ResponseTooLarge,
    InvalidXml,
    StorageError,
    NotFound,
    Cancelled,
    RetentionError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Blocked => "blocked",
            ErrorCode::Timeout => "timeout",
            ErrorCode::NetworkError => "network_error",
            ErrorCode::HttpError => "http_error",
            ErrorCode::TooManyRedirects => "too_many_redirects",
            ErrorCode::ResponseTooLarge => "response_too_large",
            ErrorCode::InvalidXml => "invalid_xml",
            ErrorCode::StorageError => "storage_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::RetentionError => "retention_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FetchErrorKind> for ErrorCode {
    fn from(kind: FetchErrorKind) -> Self {
        match kind {
            FetchErrorKind::Blocked => ErrorCode::Blocked,
            FetchErrorKind::Timeout => ErrorCode::Timeout,
            FetchErrorKind::NetworkError => ErrorCode::NetworkError,
            FetchErrorKind::HttpError => ErrorCode::HttpError,
            FetchErrorKind::TooManyRedirects => ErrorCode::TooManyRedirects,
            FetchErrorKind::ResponseTooLarge => ErrorCode::ResponseTooLarge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    Updated,
    NotModified,
}

/// Outcome of refreshing one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRefreshResult {
    pub feed_id: i64,
    /// Empty when the feed id did not resolve to one of the user's feeds.
    pub feed_url: String,
    pub new_item_count: u64,
    pub status: RefreshStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_state: Option<FetchState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Items removed by this feed's own retention pass.
    pub deleted_count: u64,
}

impl FeedRefreshResult {
    pub(crate) fn success(feed_id: i64, feed_url: &str, fetch_state: FetchState) -> Self {
        Self {
            feed_id,
            feed_url: feed_url.to_string(),
            new_item_count: 0,
            status: RefreshStatus::Success,
            fetch_state: Some(fetch_state),
            error_code: None,
            error_message: None,
            deleted_count: 0,
        }
    }

    pub(crate) fn failure(feed_id: i64, feed_url: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            feed_id,
            feed_url: feed_url.to_string(),
            new_item_count: 0,
            status: RefreshStatus::Error,
            fetch_state: None,
            error_code: Some(code),
            error_message: Some(message.into()),
            deleted_count: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RefreshStatus::Success
    }
}

/// Aggregate response for a batch refresh. One result per requested feed, in
/// request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub results: Vec<FeedRefreshResult>,
    /// Per-feed prunes plus the final user-wide pass.
    pub retention_deleted_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RefreshResponse {
    pub fn new_item_count(&self) -> u64 {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.new_item_count)
            .sum()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}
