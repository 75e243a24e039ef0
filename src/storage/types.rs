use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) messages.
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Feeds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Error,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Error => "error",
        }
    }

    fn from_column(value: Option<&str>) -> Option<Self> {
        match value {
            Some("success") => Some(FetchStatus::Success),
            Some("error") => Some(FetchStatus::Error),
            _ => None,
        }
    }
}

/// One subscription owned by a user.
///
/// Timestamps are unix seconds. `etag`/`last_modified` are the HTTP
/// validators from the last successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetched_at: Option<i64>,
    pub last_fetch_status: Option<FetchStatus>,
    pub last_fetch_error_code: Option<String>,
    pub last_fetch_error_message: Option<String>,
    pub last_fetch_error_at: Option<i64>,
    pub created_at: i64,
}

/// Internal row type for feed queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetched_at: Option<i64>,
    pub last_fetch_status: Option<String>,
    pub last_fetch_error_code: Option<String>,
    pub last_fetch_error_message: Option<String>,
    pub last_fetch_error_at: Option<i64>,
    pub created_at: i64,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            user_id: self.user_id,
            url: self.url,
            title: self.title,
            etag: self.etag,
            last_modified: self.last_modified,
            last_fetched_at: self.last_fetched_at,
            last_fetch_status: FetchStatus::from_column(self.last_fetch_status.as_deref()),
            last_fetch_error_code: self.last_fetch_error_code,
            last_fetch_error_message: self.last_fetch_error_message,
            last_fetch_error_at: self.last_fetch_error_at,
            created_at: self.created_at,
        }
    }
}

pub(crate) const FEED_COLUMNS: &str = "id, user_id, url, title, etag, last_modified, \
     last_fetched_at, last_fetch_status, last_fetch_error_code, \
     last_fetch_error_message, last_fetch_error_at, created_at";

/// Outcome of one fetch attempt, as recorded on the feed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStateUpdate {
    /// Fresh body or 304. Clears error fields; `title` is stored only if the
    /// feed has none yet.
    Success {
        etag: Option<String>,
        last_modified: Option<String>,
        fetched_at: i64,
        title: Option<String>,
    },
    /// Validators and `last_fetched_at` are left untouched.
    Failure {
        code: String,
        message: String,
        at: i64,
    },
}

// ============================================================================
// Feed Items
// ============================================================================

/// A stored feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FeedItem {
    pub id: i64,
    pub feed_id: i64,
    pub identity_key: String,
    pub guid: Option<String>,
    pub fingerprint: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<i64>,
    /// First time the item was seen.
    pub created_at: i64,
    pub read_at: Option<i64>,
    /// User pin; saved items are never pruned.
    pub saved_at: Option<i64>,
}

/// Fields written by an upsert. `guid` and `fingerprint` are only written on
/// insert; the rest are refreshed on every re-encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFields {
    pub guid: Option<String>,
    pub fingerprint: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn is_new(self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }

    pub fn item_id(self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => id,
        }
    }
}
