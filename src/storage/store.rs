use async_trait::async_trait;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FetchStateUpdate, ItemFields, UpsertOutcome};

/// Storage collaborator used by the ingest pipeline.
///
/// User-facing lookups are scoped by owner: a feed that belongs to another
/// user is indistinguishable from one that does not exist.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn find_feed(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>, DatabaseError>;

    async fn list_user_feeds(&self, user_id: i64) -> Result<Vec<Feed>, DatabaseError>;

    async fn upsert_feed_item(
        &self,
        feed_id: i64,
        identity_key: &str,
        fields: &ItemFields,
    ) -> Result<UpsertOutcome, DatabaseError>;

    async fn update_feed_fetch_state(
        &self,
        feed_id: i64,
        update: &FetchStateUpdate,
    ) -> Result<(), DatabaseError>;

    async fn count_unsaved_items(&self, user_id: i64, feed_id: i64) -> Result<i64, DatabaseError>;

    async fn oldest_unsaved_item_ids(
        &self,
        user_id: i64,
        feed_id: i64,
        limit: i64,
    ) -> Result<Vec<i64>, DatabaseError>;

    async fn delete_items(&self, user_id: i64, ids: &[i64]) -> Result<u64, DatabaseError>;

    async fn feeds_over_cap(&self, user_id: i64, cap: i64) -> Result<Vec<i64>, DatabaseError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn find_feed(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        Database::find_feed(self, user_id, feed_id).await
    }

    async fn list_user_feeds(&self, user_id: i64) -> Result<Vec<Feed>, DatabaseError> {
        Database::list_user_feeds(self, user_id).await
    }

    async fn upsert_feed_item(
        &self,
        feed_id: i64,
        identity_key: &str,
        fields: &ItemFields,
    ) -> Result<UpsertOutcome, DatabaseError> {
        Database::upsert_feed_item(self, feed_id, identity_key, fields).await
    }

    async fn update_feed_fetch_state(
        &self,
        feed_id: i64,
        update: &FetchStateUpdate,
    ) -> Result<(), DatabaseError> {
        Database::update_feed_fetch_state(self, feed_id, update).await
    }

    async fn count_unsaved_items(&self, user_id: i64, feed_id: i64) -> Result<i64, DatabaseError> {
        Database::count_unsaved_items(self, user_id, feed_id).await
    }

    async fn oldest_unsaved_item_ids(
        &self,
        user_id: i64,
        feed_id: i64,
        limit: i64,
    ) -> Result<Vec<i64>, DatabaseError> {
        Database::oldest_unsaved_item_ids(self, user_id, feed_id, limit).await
    }

    async fn delete_items(&self, user_id: i64, ids: &[i64]) -> Result<u64, DatabaseError> {
        Database::delete_items(self, user_id, ids).await
    }

    async fn feeds_over_cap(&self, user_id: i64, cap: i64) -> Result<Vec<i64>, DatabaseError> {
        Database::feeds_over_cap(self, user_id, cap).await
    }
}
