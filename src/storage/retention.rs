use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::DatabaseError;

impl Database {
    // ========================================================================
    // Retention Queries
    // ========================================================================
    //
    // Every query joins through `feeds.user_id`; a feed the user does not own
    // behaves exactly like a feed with no items.

    /// Number of unsaved items in one of the user's feeds.
    pub async fn count_unsaved_items(&self, user_id: i64, feed_id: i64) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM feed_items i
            JOIN feeds f ON f.id = i.feed_id
            WHERE f.user_id = ? AND i.feed_id = ? AND i.saved_at IS NULL
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Ids of the `limit` oldest unsaved items, ordered by publication time
    /// (falling back to first-seen time), then id.
    pub async fn oldest_unsaved_item_ids(
        &self,
        user_id: i64,
        feed_id: i64,
        limit: i64,
    ) -> Result<Vec<i64>, DatabaseError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT i.id
            FROM feed_items i
            JOIN feeds f ON f.id = i.feed_id
            WHERE f.user_id = ? AND i.feed_id = ? AND i.saved_at IS NULL
            ORDER BY COALESCE(i.published_at, i.created_at) ASC, i.id ASC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Delete unsaved items owned by `user_id`. Ids of saved items or of other
    /// users' items are skipped. Returns the number of rows deleted.
    pub async fn delete_items(&self, user_id: i64, ids: &[i64]) -> Result<u64, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }

        // Stay well below SQLite's bound-parameter limit.
        const BATCH_SIZE: usize = 500;
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for chunk in ids.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "DELETE FROM feed_items WHERE saved_at IS NULL \
                 AND feed_id IN (SELECT id FROM feeds WHERE user_id = ",
            );
            builder.push_bind(user_id);
            builder.push(") AND id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            deleted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }

    /// The user's feeds holding more than `cap` unsaved items, by id.
    pub async fn feeds_over_cap(&self, user_id: i64, cap: i64) -> Result<Vec<i64>, DatabaseError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT f.id
            FROM feeds f
            JOIN feed_items i ON i.feed_id = f.id
            WHERE f.user_id = ? AND i.saved_at IS NULL
            GROUP BY f.id
            HAVING COUNT(*) > ?
            ORDER BY f.id
        "#,
        )
        .bind(user_id)
        .bind(cap)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
