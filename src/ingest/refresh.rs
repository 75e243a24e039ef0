use std::sync::Arc;
use std::time::Duration;

use super::retention::prune_feed;
use super::types::{ErrorCode, FeedRefreshResult, FetchState};
use crate::feed::{identity_key, FetchFeed, FetchOptions, FetchOutcome, ParseFeed, ParsedItem};
use crate::storage::{Feed, FeedStore, FetchStateUpdate, ItemFields};

/// Runtime knobs for the ingest pipeline.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Timeout, retry and redirect limits for every fetch. Validators are
    /// filled in per feed.
    pub fetch: FetchOptions,
    /// Maximum feeds refreshed at once.
    pub concurrency: usize,
    /// Unsaved items kept per feed; 0 disables pruning.
    pub retention_cap: u64,
    /// Overall budget for a batch refresh.
    pub deadline: Option<Duration>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            concurrency: 8,
            retention_cap: 1000,
            deadline: Some(Duration::from_secs(120)),
        }
    }
}

/// Drives feed refreshes: fetch, parse, identity resolution, upsert, prune.
///
/// Holds its collaborators behind the narrow [`FetchFeed`], [`ParseFeed`] and
/// [`FeedStore`] interfaces and carries no per-call state.
#[derive(Clone)]
pub struct Ingestor {
    pub(super) fetcher: Arc<dyn FetchFeed>,
    pub(super) parser: Arc<dyn ParseFeed>,
    pub(super) store: Arc<dyn FeedStore>,
    pub(super) settings: IngestSettings,
}

impl Ingestor {
    pub fn new(
        fetcher: Arc<dyn FetchFeed>,
        parser: Arc<dyn ParseFeed>,
        store: Arc<dyn FeedStore>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            fetcher,
            parser,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Refresh a single feed owned by `user_id`.
    pub async fn refresh_feed(&self, user_id: i64, feed_id: i64) -> FeedRefreshResult {
        match self.store.find_feed(user_id, feed_id).await {
            Ok(Some(feed)) => self.refresh_loaded(user_id, &feed).await,
            Ok(None) => not_found(feed_id),
            Err(e) => {
                tracing::warn!(feed_id = feed_id, error = %e, "Failed to load feed");
                FeedRefreshResult::failure(feed_id, "", ErrorCode::StorageError, e.to_string())
            }
        }
    }

    /// The per-feed state machine. Every failure is captured in the result.
    pub(super) async fn refresh_loaded(&self, user_id: i64, feed: &Feed) -> FeedRefreshResult {
        let options = self
            .settings
            .fetch
            .with_validators(feed.etag.clone(), feed.last_modified.clone());

        let outcome = match self.fetcher.fetch(&feed.url, &options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let code = ErrorCode::from(e.kind());
                tracing::warn!(feed_id = feed.id, url = %feed.url, code = %code, error = %e, "Feed fetch failed");
                return self.fail(feed, code, e.to_string()).await;
            }
        };

        let (mut result, title) = match outcome {
            FetchOutcome::NotModified {
                etag,
                last_modified,
                ..
            } => {
                tracing::debug!(feed_id = feed.id, url = %feed.url, "Feed not modified");
                let result = FeedRefreshResult::success(feed.id, &feed.url, FetchState::NotModified);
                let update = FetchStateUpdate::Success {
                    etag,
                    last_modified,
                    fetched_at: chrono::Utc::now().timestamp(),
                    title: None,
                };
                if let Err(e) = self.store.update_feed_fetch_state(feed.id, &update).await {
                    return storage_failure(feed, 0, &e);
                }
                (result, None)
            }
            FetchOutcome::Ok(body) => {
                let parsed = match self.parser.parse(&body.body) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::warn!(feed_id = feed.id, url = %feed.url, error = %e, "Feed parse failed");
                        return self.fail(feed, ErrorCode::InvalidXml, e.to_string()).await;
                    }
                };

                let mut result = FeedRefreshResult::success(feed.id, &feed.url, FetchState::Updated);
                for item in &parsed.items {
                    let (key, fingerprint) = identity_key(item);
                    match self.store.upsert_feed_item(feed.id, &key, &item_fields(item, fingerprint)).await {
                        Ok(outcome) if outcome.is_new() => result.new_item_count += 1,
                        Ok(_) => {}
                        Err(e) => return storage_failure(feed, result.new_item_count, &e),
                    }
                }

                let update = FetchStateUpdate::Success {
                    etag: body.etag,
                    last_modified: body.last_modified,
                    fetched_at: chrono::Utc::now().timestamp(),
                    title: parsed.title.clone(),
                };
                if let Err(e) = self.store.update_feed_fetch_state(feed.id, &update).await {
                    return storage_failure(feed, result.new_item_count, &e);
                }
                (result, parsed.title)
            }
        };

        result.deleted_count = self.prune(user_id, feed.id).await;

        tracing::info!(
            feed_id = feed.id,
            title = title.as_deref().or(feed.title.as_deref()).unwrap_or(""),
            new_items = result.new_item_count,
            deleted = result.deleted_count,
            not_modified = result.fetch_state == Some(FetchState::NotModified),
            "Feed refreshed"
        );
        result
    }

    /// Retention failures are logged and never fail the refresh.
    async fn prune(&self, user_id: i64, feed_id: i64) -> u64 {
        match prune_feed(self.store.as_ref(), user_id, feed_id, self.settings.retention_cap).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(
                    feed_id = feed_id,
                    code = %ErrorCode::RetentionError,
                    error = %e,
                    "Retention pass failed"
                );
                0
            }
        }
    }

    /// Record a failed fetch or parse on the feed row. Validators are left
    /// alone so the next refresh fetches the body again.
    async fn fail(&self, feed: &Feed, code: ErrorCode, message: String) -> FeedRefreshResult {
        let update = FetchStateUpdate::Failure {
            code: code.as_str().to_string(),
            message: message.clone(),
            at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self.store.update_feed_fetch_state(feed.id, &update).await {
            tracing::warn!(feed_id = feed.id, error = %e, "Failed to record feed error");
        }
        FeedRefreshResult::failure(feed.id, &feed.url, code, message)
    }
}

pub(super) fn not_found(feed_id: i64) -> FeedRefreshResult {
    FeedRefreshResult::failure(feed_id, "", ErrorCode::NotFound, "Feed not found")
}

fn storage_failure(feed: &Feed, new_item_count: u64, err: &crate::storage::DatabaseError) -> FeedRefreshResult {
    tracing::warn!(feed_id = feed.id, error = %err, "Storage failure during refresh");
    let mut result = FeedRefreshResult::failure(feed.id, &feed.url, ErrorCode::StorageError, err.to_string());
    result.new_item_count = new_item_count;
    result
}

fn item_fields(item: &ParsedItem, fingerprint: Option<String>) -> ItemFields {
    ItemFields {
        guid: item.guid.clone(),
        fingerprint,
        title: item.title.clone(),
        link: item.link.clone(),
        content: item.content.clone(),
        author: item.author.clone(),
        published_at: item.published_at.map(|dt| dt.timestamp()),
    }
}
