//! # Sale Repository
//!
//! Sales orders, their amounts and their collection status.
//!
//! ## Creating a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   BEGIN                                                                 │
//! │     lock client row ─────────── missing? ─► ClientNotFound (404)       │
//! │     client examined? ─────────── no ──────► NotExamined (422)          │
//! │     resolve prescription                                               │
//! │       ├─ id given: exists? ──── no ──────► UnknownPrescription (422)   │
//! │       │            same client? ─ no ────► PrescriptionMismatch (422)  │
//! │       └─ omitted: latest ────── none ────► NoPrescription (422)        │
//! │     allocate SALE/2025/03/<nnn>                                        │
//! │     INSERT sale (pending_job or pending_collection)                    │
//! │     append newSale notification                                        │
//! │   COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales are addressed by UUID or by reference number.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use optica_core::status::{self, ActorRole, RecordStatus};
use optica_core::{
    CoreError, EntityKind, Event, IdTemplate, NewSale, Sale, SaleAmounts, SaleAmountsUpdate,
};

use super::{client, notification, now, prescription, sequence, with_retry, Outcome};
use crate::error::DbResult;

pub(crate) const SALE_COLUMNS: &str = "id, reference_number, client_id, prescription_id, brand, model, \
     color, lens_type, amount_cents, quantity, total_cents, advance_cents, balance_cents, \
     requires_job, delivery_date, status, created_at, updated_at";

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1 OR reference_number = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sale)
}

pub(crate) async fn for_client(conn: &mut SqliteConnection, client_id: &str) -> DbResult<Vec<Sale>> {
    let sql = format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE client_id = ?1 ORDER BY created_at DESC, rowid DESC"
    );
    let sales = sqlx::query_as::<_, Sale>(&sql)
        .bind(client_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(sales)
}

/// Touches the sale and returns it, taking the write lock.
async fn lock(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    let sql = format!(
        "UPDATE sales SET updated_at = ?2 WHERE id = ?1 OR reference_number = ?1 RETURNING {SALE_COLUMNS}"
    );
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .bind(now())
        .fetch_optional(&mut *conn)
        .await?;
    sale.ok_or_else(|| CoreError::SaleNotFound(id.to_string()).into())
}

/// Repository for sales orders.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    template: IdTemplate,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, template: IdTemplate) -> Self {
        SaleRepository { pool, template }
    }

    /// Creates a sale for an examined client.
    pub async fn create(&self, new: NewSale, today: NaiveDate) -> DbResult<Outcome<Sale>> {
        let (new, amounts) = new.validate(today)?;
        let new = &new;
        with_retry("create_sale", move || self.try_create(new, amounts, today)).await
    }

    async fn try_create(&self, new: &NewSale, amounts: SaleAmounts, today: NaiveDate) -> DbResult<Outcome<Sale>> {
        if let Some(key) = &new.idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                debug!(idempotency_key = %key, reference_number = %existing.reference_number, "Replayed sale");
                return Ok(Outcome::unchanged(existing));
            }
        }

        let mut tx = self.pool.begin().await?;

        let client_status = client::lock_status(&mut tx, &new.client_id).await?;
        let status = status::sale_entry_status(&new.client_id, client_status, new.requires_job)?;

        let prescription_id = match &new.prescription_id {
            Some(id) => {
                let found = prescription::fetch(&mut tx, id).await?.ok_or_else(|| {
                    CoreError::UnknownPrescription {
                        prescription_id: id.clone(),
                    }
                })?;
                if found.client_id != new.client_id {
                    return Err(CoreError::PrescriptionMismatch {
                        prescription_id: id.clone(),
                        client_id: new.client_id.clone(),
                    }
                    .into());
                }
                found.id
            }
            None => {
                prescription::latest(&mut tx, &new.client_id)
                    .await?
                    .ok_or_else(|| CoreError::NoPrescription {
                        client_id: new.client_id.clone(),
                    })?
                    .id
            }
        };

        let reference = sequence::allocate(&mut tx, EntityKind::Sale, &self.template, today).await?;
        let now = now();

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            reference_number: reference.value,
            client_id: new.client_id.clone(),
            prescription_id,
            brand: new.brand.clone(),
            model: new.model.clone(),
            color: new.color.clone(),
            lens_type: new.lens_type.clone(),
            amount_cents: amounts.amount_cents,
            quantity: amounts.quantity,
            total_cents: amounts.total_cents,
            advance_cents: amounts.advance_cents,
            balance_cents: amounts.balance_cents,
            requires_job: new.requires_job,
            delivery_date: new.delivery_date,
            status,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO sales (id, reference_number, client_id, prescription_id, brand, model, color,
                                lens_type, amount_cents, quantity, total_cents, advance_cents,
                                balance_cents, requires_job, delivery_date, status, idempotency_key,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)",
        )
        .bind(&sale.id)
        .bind(&sale.reference_number)
        .bind(&sale.client_id)
        .bind(&sale.prescription_id)
        .bind(&sale.brand)
        .bind(&sale.model)
        .bind(&sale.color)
        .bind(&sale.lens_type)
        .bind(sale.amount_cents)
        .bind(sale.quantity)
        .bind(sale.total_cents)
        .bind(sale.advance_cents)
        .bind(sale.balance_cents)
        .bind(sale.requires_job)
        .bind(sale.delivery_date)
        .bind(sale.status)
        .bind(&new.idempotency_key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let event = Event::new_sale(&sale, now);
        notification::append(&mut tx, &event).await?;
        tx.commit().await?;

        info!(
            reference_number = %sale.reference_number,
            registration_number = %sale.client_id,
            status = %sale.status,
            total_cents = sale.total_cents,
            "Sale created"
        );
        Ok(Outcome::changed(sale, event))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE idempotency_key = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// Gets a sale by UUID or reference number.
    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Lists sales, newest first, optionally filtered.
    pub async fn list(
        &self,
        status: Option<RecordStatus>,
        client_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR client_id = ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(status)
            .bind(client_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    /// Changes amount, quantity or advance and recomputes total and balance.
    pub async fn update_amounts(&self, id: &str, update: SaleAmountsUpdate) -> DbResult<Sale> {
        let update = &update;
        with_retry("update_sale_amounts", move || self.try_update_amounts(id, update)).await
    }

    async fn try_update_amounts(&self, id: &str, update: &SaleAmountsUpdate) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let sale = lock(&mut tx, id).await?;
        let amounts = sale
            .amounts()
            .update(update.amount_cents, update.quantity, update.advance_cents)?;

        sqlx::query(
            "UPDATE sales
             SET amount_cents = ?2, quantity = ?3, total_cents = ?4, advance_cents = ?5, balance_cents = ?6
             WHERE id = ?1",
        )
        .bind(&sale.id)
        .bind(amounts.amount_cents)
        .bind(amounts.quantity)
        .bind(amounts.total_cents)
        .bind(amounts.advance_cents)
        .bind(amounts.balance_cents)
        .execute(&mut *tx)
        .await?;

        let updated = Sale {
            amount_cents: amounts.amount_cents,
            quantity: amounts.quantity,
            total_cents: amounts.total_cents,
            advance_cents: amounts.advance_cents,
            balance_cents: amounts.balance_cents,
            ..sale
        };
        tx.commit().await?;

        info!(
            reference_number = %updated.reference_number,
            total_cents = updated.total_cents,
            balance_cents = updated.balance_cents,
            "Sale amounts updated"
        );
        Ok(updated)
    }

    /// Sets a sale's status.
    pub async fn set_status(&self, id: &str, target: RecordStatus, actor: ActorRole) -> DbResult<Outcome<Sale>> {
        with_retry("set_sale_status", move || self.try_set_status(id, target, actor)).await
    }

    async fn try_set_status(&self, id: &str, target: RecordStatus, actor: ActorRole) -> DbResult<Outcome<Sale>> {
        let mut tx = self.pool.begin().await?;
        let sale = lock(&mut tx, id).await?;
        let transition = status::transition(EntityKind::Sale, sale.status, target, actor)?;

        if !transition.is_change() {
            tx.rollback().await?;
            let unchanged = self
                .get(id)
                .await?
                .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;
            return Ok(Outcome::unchanged(unchanged));
        }

        sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1")
            .bind(&sale.id)
            .bind(transition.to)
            .execute(&mut *tx)
            .await?;

        let updated = Sale {
            status: transition.to,
            ..sale
        };
        let event = Event::sale_status(&updated, &transition, actor, updated.updated_at);
        notification::append(&mut tx, &event).await?;
        tx.commit().await?;

        if transition.is_override() {
            warn!(reference_number = %updated.reference_number, from = %transition.from, to = %transition.to, actor = %actor, "Sale status overridden");
        } else {
            info!(reference_number = %updated.reference_number, to = %transition.to, "Sale status updated");
        }

        Ok(Outcome::changed(updated, event))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{db, examined_client, march, new_client, new_prescription, new_sale};
    use crate::{Database, DbConfig};
    use optica_core::{ErrorKind, EventKind};

    #[tokio::test]
    async fn test_create_computes_amounts_and_reference() {
        let db = db().await;
        let client_id = examined_client(&db, "Amani").await;

        let outcome = db.sales().create(new_sale(&client_id), march()).await.unwrap();
        let sale = outcome.record;

        assert_eq!(sale.reference_number, "SALE/2025/03/001");
        assert_eq!(sale.total_cents, 10000);
        assert_eq!(sale.balance_cents, 7000);
        assert_eq!(sale.status, RecordStatus::PendingCollection);
        assert_eq!(outcome.event.unwrap().kind, EventKind::NewSale);

        let second = db.sales().create(new_sale(&client_id), march()).await.unwrap();
        assert_eq!(second.record.reference_number, "SALE/2025/03/002");

        let by_reference = db.sales().get("SALE/2025/03/001").await.unwrap().unwrap();
        assert_eq!(by_reference.id, sale.id);
    }

    #[tokio::test]
    async fn test_lab_job_enters_pending_job() {
        let db = db().await;
        let client_id = examined_client(&db, "Amani").await;
        let mut form = new_sale(&client_id);
        form.requires_job = true;

        let sale = db.sales().create(form, march()).await.unwrap().record;
        assert_eq!(sale.status, RecordStatus::PendingJob);
    }

    #[tokio::test]
    async fn test_create_preconditions() {
        let db = db().await;

        let missing = db.sales().create(new_sale("M/1999/01/1"), march()).await.unwrap_err();
        assert!(matches!(missing, DbError::Domain(CoreError::ClientNotFound(_))));

        let waiting = db.clients().register(new_client("Amani"), march()).await.unwrap().record;
        let err = db
            .sales()
            .create(new_sale(&waiting.registration_number), march())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotExamined { .. })));

        let examined = examined_client(&db, "Baraka").await;
        let mut dangling = new_sale(&examined);
        dangling.prescription_id = Some(Uuid::new_v4().to_string());
        let err = db.sales().create(dangling, march()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(ref e) if e.kind() == ErrorKind::Precondition));

        // A prescription of another client is rejected too.
        db.prescriptions()
            .record(new_prescription(&waiting.registration_number), march())
            .await
            .unwrap();
        let other = db
            .prescriptions()
            .latest_for_client(&waiting.registration_number)
            .await
            .unwrap()
            .unwrap();
        let mut foreign = new_sale(&examined);
        foreign.prescription_id = Some(other.id);
        let err = db.sales().create(foreign, march()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PrescriptionMismatch { .. })));

        // Nothing was allocated by the failed attempts.
        let ok = db.sales().create(new_sale(&examined), march()).await.unwrap();
        assert_eq!(ok.record.reference_number, "SALE/2025/03/001");
    }

    #[tokio::test]
    async fn test_update_amounts_keeps_equations() {
        let db = db().await;
        let client_id = examined_client(&db, "Amani").await;
        let sale = db.sales().create(new_sale(&client_id), march()).await.unwrap().record;

        let updated = db
            .sales()
            .update_amounts(
                &sale.id,
                SaleAmountsUpdate {
                    quantity: Some(3),
                    advance_cents: Some(15000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_cents, 15000);
        assert_eq!(updated.balance_cents, 0);

        let stored = db.sales().get(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.amounts(), updated.amounts());

        let err = db
            .sales()
            .update_amounts(&sale.id, SaleAmountsUpdate { advance_cents: Some(20000), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(ref e) if e.kind() == ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_status_lifecycle() {
        let db = db().await;
        let client_id = examined_client(&db, "Amani").await;
        let mut form = new_sale(&client_id);
        form.requires_job = true;
        let sale = db.sales().create(form, march()).await.unwrap().record;
        let repo = db.sales();

        let skip = repo.set_status(&sale.id, RecordStatus::Collected, ActorRole::Staff).await.unwrap_err();
        assert!(matches!(skip, DbError::Domain(CoreError::InvalidTransition { .. })));

        for target in [RecordStatus::JobComplete, RecordStatus::PendingCollection, RecordStatus::Collected] {
            let outcome = repo.set_status(&sale.reference_number, target, ActorRole::Staff).await.unwrap();
            assert_eq!(outcome.record.status, target);
            assert_eq!(outcome.event.unwrap().kind, EventKind::SaleStatusUpdate);
        }

        let again = repo.set_status(&sale.id, RecordStatus::Collected, ActorRole::Staff).await.unwrap();
        assert!(again.event.is_none());

        let reverted = repo.set_status(&sale.id, RecordStatus::PendingCollection, ActorRole::Admin).await.unwrap();
        assert_eq!(reverted.record.status, RecordStatus::PendingCollection);

        let client_stage = repo.set_status(&sale.id, RecordStatus::Examined, ActorRole::Admin).await.unwrap_err();
        assert!(matches!(client_stage, DbError::Domain(CoreError::InvalidTransition { .. })));

        assert_eq!(
            repo.list(Some(RecordStatus::PendingCollection), None, 50).await.unwrap().len(),
            1
        );
        assert!(repo.list(Some(RecordStatus::Collected), None, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idempotent_sale() {
        let db = db().await;
        let client_id = examined_client(&db, "Amani").await;
        let mut form = new_sale(&client_id);
        form.idempotency_key = Some("sale-form-1".to_string());

        let first = db.sales().create(form.clone(), march()).await.unwrap();
        let replay = db.sales().create(form, march()).await.unwrap();
        assert_eq!(first.record.id, replay.record.id);
        assert!(replay.event.is_none());
        assert_eq!(db.sales().list(None, Some(&client_id), 50).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_distinct_and_gapless() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("optica.db")).max_connections(4))
            .await
            .unwrap();
        let first = examined_client(&db, "Amani").await;
        let second = examined_client(&db, "Baraka").await;

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                let client_id = if i % 2 == 0 { first.clone() } else { second.clone() };
                tokio::spawn(async move {
                    db.sales()
                        .create(new_sale(&client_id), march())
                        .await
                        .map(|o| o.record)
                })
            })
            .collect();

        let mut sales = Vec::new();
        for result in futures_util::future::join_all(tasks).await {
            sales.push(result.unwrap().unwrap());
        }

        let mut references: Vec<String> = sales.iter().map(|s| s.reference_number.clone()).collect();
        references.sort();
        let expected: Vec<String> = (1..=16).map(|n| format!("SALE/2025/03/{n:03}")).collect();
        assert_eq!(references, expected);

        let updates: Vec<_> = sales
            .iter()
            .map(|sale| {
                let db = db.clone();
                let id = sale.id.clone();
                tokio::spawn(async move {
                    db.sales()
                        .update_amounts(&id, SaleAmountsUpdate { advance_cents: Some(10000), ..Default::default() })
                        .await
                })
            })
            .collect();
        for result in futures_util::future::join_all(updates).await {
            assert_eq!(result.unwrap().unwrap().balance_cents, 0);
        }
    }
}
