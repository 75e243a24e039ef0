//! Per-feed retention cap.
//!
//! Unsaved items beyond the cap are deleted oldest-first (publication time,
//! falling back to first-seen time). Saved items are never touched and do not
//! count towards the cap. A cap of 0 disables pruning.

use crate::storage::{DatabaseError, FeedStore};

fn cap_as_i64(cap: u64) -> i64 {
    i64::try_from(cap).unwrap_or(i64::MAX)
}

/// Trim one feed down to `cap` unsaved items. A feed the user does not own
/// (or that does not exist) is a no-op returning 0.
pub async fn prune_feed<S>(store: &S, user_id: i64, feed_id: i64, cap: u64) -> Result<u64, DatabaseError>
where
    S: FeedStore + ?Sized,
{
    if cap == 0 {
        return Ok(0);
    }

    let unsaved = store.count_unsaved_items(user_id, feed_id).await?;
    let excess = unsaved.saturating_sub(cap_as_i64(cap));
    if excess <= 0 {
        return Ok(0);
    }

    let ids = store.oldest_unsaved_item_ids(user_id, feed_id, excess).await?;
    let deleted = store.delete_items(user_id, &ids).await?;
    tracing::info!(
        user_id = user_id,
        feed_id = feed_id,
        cap = cap,
        deleted = deleted,
        "Pruned feed to retention cap"
    );
    Ok(deleted)
}

/// Trim every feed of the user that is over the cap.
pub async fn prune_user<S>(store: &S, user_id: i64, cap: u64) -> Result<u64, DatabaseError>
where
    S: FeedStore + ?Sized,
{
    if cap == 0 {
        return Ok(0);
    }

    let mut deleted = 0;
    for feed_id in store.feeds_over_cap(user_id, cap_as_i64(cap)).await? {
        deleted += prune_feed(store, user_id, feed_id, cap).await?;
    }
    Ok(deleted)
}

/// Whether any of the user's feeds currently exceeds the cap. Read-only.
pub async fn is_purge_needed<S>(store: &S, user_id: i64, cap: u64) -> Result<bool, DatabaseError>
where
    S: FeedStore + ?Sized,
{
    if cap == 0 {
        return Ok(false);
    }
    Ok(!store.feeds_over_cap(user_id, cap_as_i64(cap)).await?.is_empty())
}
