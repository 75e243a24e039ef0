use super::schema::Database;
use super::types::{DatabaseError, FeedItem, ItemFields, UpsertOutcome};

const ITEM_COLUMNS: &str = "id, feed_id, identity_key, guid, fingerprint, title, link, content, \
     author, published_at, created_at, read_at, saved_at";

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    /// Insert a new item, or refresh the content fields of the item already
    /// stored under `(feed_id, identity_key)`.
    ///
    /// `read_at`, `saved_at`, `created_at`, `guid` and `fingerprint` of an
    /// existing row are never touched. The unique constraint makes this safe
    /// when two refreshes of the same feed race: neither creates a duplicate,
    /// and the last writer's content wins.
    pub async fn upsert_feed_item(
        &self,
        feed_id: i64,
        identity_key: &str,
        fields: &ItemFields,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO feed_items
                (feed_id, identity_key, guid, fingerprint, title, link, content, author, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, identity_key) DO NOTHING
            RETURNING id
        "#,
        )
        .bind(feed_id)
        .bind(identity_key)
        .bind(&fields.guid)
        .bind(&fields.fingerprint)
        .bind(&fields.title)
        .bind(&fields.link)
        .bind(&fields.content)
        .bind(&fields.author)
        .bind(fields.published_at)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match inserted {
            Some((id,)) => UpsertOutcome::Inserted(id),
            None => {
                let (id,): (i64,) = sqlx::query_as(
                    r#"
                    UPDATE feed_items
                    SET title = ?, link = ?, content = ?, author = ?, published_at = ?
                    WHERE feed_id = ? AND identity_key = ?
                    RETURNING id
                "#,
                )
                .bind(&fields.title)
                .bind(&fields.link)
                .bind(&fields.content)
                .bind(&fields.author)
                .bind(fields.published_at)
                .bind(feed_id)
                .bind(identity_key)
                .fetch_one(&mut *tx)
                .await?;
                UpsertOutcome::Updated(id)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// A feed's items, newest first.
    pub async fn get_items_for_feed(&self, feed_id: i64) -> Result<Vec<FeedItem>, DatabaseError> {
        let items: Vec<FeedItem> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM feed_items WHERE feed_id = ? \
             ORDER BY COALESCE(published_at, created_at) DESC, id DESC"
        ))
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Mark an item read. The first read time is kept.
    pub async fn mark_item_read(&self, item_id: i64) -> Result<(), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE feed_items SET read_at = COALESCE(read_at, ?) WHERE id = ?")
            .bind(now)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Pin (`saved = true`) or unpin an item. Pinned items are exempt from
    /// retention.
    pub async fn set_item_saved(&self, item_id: i64, saved: bool) -> Result<(), DatabaseError> {
        let saved_at = saved.then(|| chrono::Utc::now().timestamp());
        sqlx::query("UPDATE feed_items SET saved_at = ? WHERE id = ?")
            .bind(saved_at)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
