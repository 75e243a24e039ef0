use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedDbRow, FetchStateUpdate, FetchStatus, FEED_COLUMNS};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Subscribe `user_id` to `url`. Subscribing twice returns the existing feed.
    pub async fn create_feed(&self, user_id: i64, url: &str) -> Result<Feed, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO feeds (user_id, url, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(user_id, url) DO NOTHING",
        )
        .bind(user_id)
        .bind(url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row: FeedDbRow = sqlx::query_as(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE user_id = ? AND url = ?"
        ))
        .bind(user_id)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_feed())
    }

    /// Look up a feed, scoped to its owner. A feed owned by someone else is `None`.
    pub async fn find_feed(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let row: Option<FeedDbRow> = sqlx::query_as(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ? AND user_id = ?"
        ))
        .bind(feed_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FeedDbRow::into_feed))
    }

    /// All of a user's feeds in subscription order.
    pub async fn list_user_feeds(&self, user_id: i64) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedDbRow> = sqlx::query_as(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Delete a feed and (by cascade) its items. Returns false when the user
    /// owns no such feed.
    pub async fn delete_feed(&self, user_id: i64, feed_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ? AND user_id = ?")
            .bind(feed_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the outcome of a fetch on the feed row.
    ///
    /// `last_fetched_at` never moves backwards, even if an older refresh
    /// finishes after a newer one.
    pub async fn update_feed_fetch_state(
        &self,
        feed_id: i64,
        update: &FetchStateUpdate,
    ) -> Result<(), DatabaseError> {
        match update {
            FetchStateUpdate::Success {
                etag,
                last_modified,
                fetched_at,
                title,
            } => {
                sqlx::query(
                    r#"
                    UPDATE feeds SET
                        etag = ?,
                        last_modified = ?,
                        last_fetched_at = MAX(COALESCE(last_fetched_at, 0), ?),
                        last_fetch_status = ?,
                        last_fetch_error_code = NULL,
                        last_fetch_error_message = NULL,
                        last_fetch_error_at = NULL,
                        title = COALESCE(title, ?)
                    WHERE id = ?
                "#,
                )
                .bind(etag)
                .bind(last_modified)
                .bind(fetched_at)
                .bind(FetchStatus::Success.as_str())
                .bind(title)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
            }
            FetchStateUpdate::Failure { code, message, at } => {
                sqlx::query(
                    r#"
                    UPDATE feeds SET
                        last_fetch_status = ?,
                        last_fetch_error_code = ?,
                        last_fetch_error_message = ?,
                        last_fetch_error_at = ?
                    WHERE id = ?
                "#,
                )
                .bind(FetchStatus::Error.as_str())
                .bind(code)
                .bind(message)
                .bind(at)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}
