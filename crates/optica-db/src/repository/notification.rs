//! # Notification Repository
//!
//! Append-only side log of events plus the read/clear operations the front
//! desk uses. Appends happen inside the transaction of the change that
//! produced the event; everything else runs on the pool.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use optica_core::{Event, Notification};

use crate::error::DbResult;

const COLUMNS: &str = "id, kind, message, related_id, is_read, created_at";

/// Writes `event` to the log; returns the notification id.
pub async fn append(conn: &mut SqliteConnection, event: &Event) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO notifications (id, kind, message, related_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
    )
    .bind(&id)
    .bind(event.kind)
    .bind(&event.message)
    .bind(&event.related_id)
    .bind(event.occurred_at)
    .execute(&mut *conn)
    .await?;

    debug!(notification_id = %id, kind = %event.kind, "Notification appended");
    Ok(id)
}

/// Repository for the notification log.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    /// Newest first.
    pub async fn list(&self, unread_only: bool, limit: u32) -> DbResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM notifications
             WHERE (?1 = 0 OR is_read = 0)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        );

        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    pub async fn unread_count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Returns `false` when no notification has this id.
    pub async fn mark_read(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns how many were unread.
    pub async fn mark_all_read(&self) -> DbResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE is_read = 0")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every notification; returns how many were removed.
    pub async fn clear(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM notifications")
            .execute(&self.pool)
            .await?;
        info!(removed = result.rows_affected(), "Notification log cleared");
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::test_support::{db, march, new_client};
    use optica_core::EventKind;

    #[tokio::test]
    async fn test_read_and_clear() {
        let db = db().await;
        db.clients().register(new_client("Amani"), march()).await.unwrap();
        db.clients().register(new_client("Baraka"), march()).await.unwrap();

        let repo = db.notifications();
        let all = repo.list(false, 50).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|n| n.kind == EventKind::NewClient));
        assert_eq!(all[0].related_id.as_deref(), Some("M/2025/03/2"));
        assert_eq!(repo.unread_count().await.unwrap(), 2);

        assert!(repo.mark_read(&all[0].id).await.unwrap());
        assert!(!repo.mark_read("missing").await.unwrap());
        assert_eq!(repo.unread_count().await.unwrap(), 1);
        assert_eq!(repo.list(true, 50).await.unwrap().len(), 1);

        assert_eq!(repo.mark_all_read().await.unwrap(), 1);
        assert_eq!(repo.unread_count().await.unwrap(), 0);

        assert!(repo.delete(&all[1].id).await.unwrap());
        assert_eq!(repo.clear().await.unwrap(), 1);
        assert!(repo.list(false, 50).await.unwrap().is_empty());
    }
}
