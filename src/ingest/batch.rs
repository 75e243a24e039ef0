use futures::stream::{self, StreamExt};
use std::collections::HashSet;

use super::cancel::{CancelReason, Cancellation};
use super::refresh::{not_found, Ingestor};
use super::retention::{is_purge_needed, prune_user};
use super::types::{ErrorCode, FeedRefreshResult, RefreshResponse};
use crate::storage::Feed;

/// A requested feed id after the ownership lookup.
enum Target {
    Owned(Feed),
    Missing(i64),
    LookupFailed(i64, String),
}

impl Ingestor {
    /// Refresh many of a user's feeds with bounded concurrency.
    ///
    /// `feed_ids` of `None` means every feed the user owns. Duplicate ids are
    /// refreshed once; ids the user does not own get a `not_found` entry.
    /// Results come back in request order regardless of completion order.
    ///
    /// Never fails as a whole: every per-feed error, including cancellation
    /// or the overall deadline cutting a feed off, lands in that feed's
    /// result entry.
    pub async fn refresh_user(
        &self,
        user_id: i64,
        feed_ids: Option<&[i64]>,
        cancel: &Cancellation,
    ) -> RefreshResponse {
        let cancel = match self.settings.deadline {
            Some(deadline) => cancel.clone().with_timeout(deadline),
            None => cancel.clone(),
        };

        let targets = match self.resolve_targets(user_id, feed_ids).await {
            Ok(targets) => targets,
            Err(message) => {
                return RefreshResponse {
                    results: Vec::new(),
                    retention_deleted_count: 0,
                    message: Some(message),
                };
            }
        };
        let total = targets.len();

        tracing::info!(
            user_id = user_id,
            feeds = total,
            concurrency = self.settings.concurrency,
            "Starting batch refresh"
        );

        let mut indexed: Vec<(usize, FeedRefreshResult)> = stream::iter(targets.into_iter().enumerate())
            .map(|(index, target)| {
                let cancel = &cancel;
                async move { (index, self.run_target(user_id, target, cancel).await) }
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<FeedRefreshResult> = indexed.into_iter().map(|(_, result)| result).collect();

        let mut retention_deleted_count: u64 = results.iter().map(|r| r.deleted_count).sum();
        retention_deleted_count += self.final_prune(user_id).await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        let message = if results.is_empty() {
            Some("No feeds to refresh".to_string())
        } else if failed > 0 {
            Some(format!("{failed} of {total} feeds failed to refresh"))
        } else {
            None
        };

        let response = RefreshResponse {
            results,
            retention_deleted_count,
            message,
        };
        tracing::info!(
            user_id = user_id,
            feeds = total,
            failed = failed,
            new_items = response.new_item_count(),
            retention_deleted = retention_deleted_count,
            "Batch refresh complete"
        );
        response
    }

    async fn resolve_targets(&self, user_id: i64, feed_ids: Option<&[i64]>) -> Result<Vec<Target>, String> {
        let Some(ids) = feed_ids else {
            return self
                .store
                .list_user_feeds(user_id)
                .await
                .map(|feeds| feeds.into_iter().map(Target::Owned).collect())
                .map_err(|e| {
                    tracing::warn!(user_id = user_id, error = %e, "Failed to list feeds");
                    format!("Failed to load feeds: {e}")
                });
        };

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(ids.len());
        for &feed_id in ids {
            if !seen.insert(feed_id) {
                continue;
            }
            targets.push(match self.store.find_feed(user_id, feed_id).await {
                Ok(Some(feed)) => Target::Owned(feed),
                Ok(None) => Target::Missing(feed_id),
                Err(e) => Target::LookupFailed(feed_id, e.to_string()),
            });
        }
        Ok(targets)
    }

    async fn run_target(&self, user_id: i64, target: Target, cancel: &Cancellation) -> FeedRefreshResult {
        let feed = match target {
            Target::Owned(feed) => feed,
            Target::Missing(feed_id) => return not_found(feed_id),
            Target::LookupFailed(feed_id, message) => {
                return FeedRefreshResult::failure(feed_id, "", ErrorCode::StorageError, message)
            }
        };

        // Dropping the refresh future aborts its fetch, including pending retries.
        tokio::select! {
            biased;
            reason = cancel.cancelled() => {
                let (code, message) = match reason {
                    CancelReason::Cancelled => (ErrorCode::Cancelled, "Refresh cancelled"),
                    CancelReason::DeadlineExceeded => (ErrorCode::Timeout, "Refresh deadline exceeded"),
                };
                tracing::info!(feed_id = feed.id, code = %code, "Feed refresh abandoned");
                FeedRefreshResult::failure(feed.id, &feed.url, code, message)
            }
            result = self.refresh_loaded(user_id, &feed) => result,
        }
    }

    async fn final_prune(&self, user_id: i64) -> u64 {
        let cap = self.settings.retention_cap;
        let store = self.store.as_ref();
        let outcome = match is_purge_needed(store, user_id, cap).await {
            Ok(false) => Ok(0),
            Ok(true) => prune_user(store, user_id, cap).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| {
            tracing::warn!(user_id = user_id, code = %ErrorCode::RetentionError, error = %e, "Final retention pass failed");
            0
        })
    }
}
