//! # Report Repository
//!
//! Figures for the admin dashboard.

use sqlx::SqlitePool;
use tracing::debug;

use optica_core::{DashboardSummary, StatusCount};

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Counts and money totals across all records.
    ///
    /// Runs in one read transaction so the figures agree with each other.
    pub async fn summary(&self) -> DbResult<DashboardSummary> {
        let mut tx = self.pool.begin().await?;

        let clients_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM clients GROUP BY status ORDER BY status",
        )
        .fetch_all(&mut *tx)
        .await?;

        let sales_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM sales GROUP BY status ORDER BY status",
        )
        .fetch_all(&mut *tx)
        .await?;

        let (revenue_cents, advances_cents, outstanding_cents): (i64, i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_cents), 0),
                    COALESCE(SUM(advance_cents), 0),
                    COALESCE(SUM(balance_cents), 0)
             FROM sales",
        )
        .fetch_one(&mut *tx)
        .await?;

        let unread_notifications: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = 0")
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        let summary = DashboardSummary {
            total_clients: clients_by_status.iter().map(|s| s.count).sum(),
            clients_by_status,
            total_sales: sales_by_status.iter().map(|s| s.count).sum(),
            sales_by_status,
            revenue_cents,
            advances_cents,
            outstanding_cents,
            unread_notifications,
        };

        debug!(
            total_clients = summary.total_clients,
            total_sales = summary.total_sales,
            "Dashboard summary computed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::{db, examined_client, march, new_client, new_sale};
    use optica_core::{RecordStatus, StatusCount};

    #[tokio::test]
    async fn test_summary() {
        let db = db().await;
        let empty = db.reports().summary().await.unwrap();
        assert_eq!(empty.total_clients, 0);
        assert_eq!(empty.revenue_cents, 0);

        let id = examined_client(&db, "Amani").await;
        db.clients().register(new_client("Baraka"), march()).await.unwrap();
        db.sales().create(new_sale(&id), march()).await.unwrap();

        let summary = db.reports().summary().await.unwrap();
        assert_eq!(summary.total_clients, 2);
        assert_eq!(summary.total_sales, 1);
        assert_eq!(summary.revenue_cents, 10000);
        assert_eq!(summary.advances_cents, 3000);
        assert_eq!(summary.outstanding_cents, 7000);
        assert!(summary.clients_by_status.contains(&StatusCount {
            status: RecordStatus::Examined,
            count: 1
        }));
        // newClient x2, newPrescription, newSale
        assert_eq!(summary.unread_notifications, 4);
    }
}
