//! # Client Repository
//!
//! Registration, contact updates, client status changes and the admin bulk
//! delete.
//!
//! ## Registration
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewClient ──validate──► idempotency key seen? ──yes──► stored client  │
//! │                               │ no                       (no event)     │
//! │                               ▼                                         │
//! │   BEGIN                                                                 │
//! │     allocate M/2025/03/<n>        (sequence counter)                    │
//! │     INSERT client as waiting_examination                               │
//! │     append newClient notification                                      │
//! │   COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleted registration numbers are never handed out again; the counter keeps
//! counting.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use optica_core::status::{self, ActorRole, RecordStatus};
use optica_core::validation::validate_optional;
use optica_core::{
    Client, ClientDetail, ClientUpdate, CoreError, EntityKind, Event, IdTemplate, NewClient,
    Prescription, Sale, ValidationError,
};

use super::{notification, now, sequence, with_retry, Outcome};
use crate::error::DbResult;

pub(crate) const CLIENT_COLUMNS: &str = "registration_number, first_name, last_name, phone, email, \
     gender, date_of_birth, address, occupation, status, created_at, updated_at";

/// Fetches a client on an existing connection.
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Client>> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE registration_number = ?1");
    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(client)
}

/// Touches `updated_at` and returns the client's status.
///
/// A write, so it is used as the first statement of transactions that
/// depend on the client's current status.
pub(crate) async fn lock_status(conn: &mut SqliteConnection, id: &str) -> DbResult<RecordStatus> {
    let status: Option<RecordStatus> = sqlx::query_scalar(
        "UPDATE clients SET updated_at = ?2 WHERE registration_number = ?1 RETURNING status",
    )
    .bind(id)
    .bind(now())
    .fetch_optional(&mut *conn)
    .await?;

    status.ok_or_else(|| CoreError::ClientNotFound(id.to_string()).into())
}

/// Repository for client records.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
    template: IdTemplate,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool, template: IdTemplate) -> Self {
        ClientRepository { pool, template }
    }

    /// Registers a client and assigns the next registration number.
    ///
    /// The client is stored as `waiting_examination`; registration itself is
    /// the automatic `registered → waiting_examination` step.
    pub async fn register(&self, new: NewClient, today: NaiveDate) -> DbResult<Outcome<Client>> {
        let new = new.validate(today)?;
        let new = &new;
        with_retry("register_client", move || self.try_register(new, today)).await
    }

    async fn try_register(&self, new: &NewClient, today: NaiveDate) -> DbResult<Outcome<Client>> {
        if let Some(key) = &new.idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                debug!(idempotency_key = %key, registration_number = %existing.registration_number, "Replayed registration");
                return Ok(Outcome::unchanged(existing));
            }
        }

        let mut tx = self.pool.begin().await?;

        let id = sequence::allocate(&mut tx, EntityKind::Client, &self.template, today).await?;
        let status = status::on_registration().to;
        let now = now();

        sqlx::query(
            "INSERT INTO clients (registration_number, first_name, last_name, phone, email, gender,
                                  date_of_birth, address, occupation, status, idempotency_key,
                                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        )
        .bind(&id.value)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone)
        .bind(&new.email)
        .bind(&new.gender)
        .bind(new.date_of_birth)
        .bind(&new.address)
        .bind(&new.occupation)
        .bind(status)
        .bind(&new.idempotency_key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let client = Client {
            registration_number: id.value,
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            gender: new.gender.clone(),
            date_of_birth: new.date_of_birth,
            address: new.address.clone(),
            occupation: new.occupation.clone(),
            status,
            created_at: now,
            updated_at: now,
        };

        let event = Event::new_client(&client, now);
        notification::append(&mut tx, &event).await?;
        tx.commit().await?;

        info!(registration_number = %client.registration_number, "Client registered");
        Ok(Outcome::changed(client, event))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE idempotency_key = ?1");
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    /// Gets a client by registration number.
    pub async fn get(&self, id: &str) -> DbResult<Option<Client>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Like [`get`](Self::get) but a missing client is an error.
    pub async fn require(&self, id: &str) -> DbResult<Client> {
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(id.to_string()).into())
    }

    /// Lists clients, newest first.
    ///
    /// `search` matches registration number, names and phone.
    pub async fn list(&self, search: Option<&str>, limit: u32) -> DbResult<Vec<Client>> {
        let search = validate_optional("search", search, 100)?;
        debug!(search = ?search, limit, "Listing clients");

        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients
             WHERE ?1 IS NULL
                OR instr(lower(registration_number), lower(?1)) > 0
                OR instr(lower(first_name || ' ' || last_name), lower(?1)) > 0
                OR instr(phone, ?1) > 0
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        );

        let clients = sqlx::query_as::<_, Client>(&sql)
            .bind(search)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(clients)
    }

    /// Updates contact details. The registration number never changes.
    pub async fn update(&self, id: &str, update: ClientUpdate) -> DbResult<Client> {
        if update.is_empty() {
            return Err(ValidationError::Required {
                field: "update".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        // Write first, then read the row we now hold the lock for.
        lock_status(&mut tx, id).await?;
        let current = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(id.to_string()))?;
        let updated = update.apply(&current)?;

        sqlx::query(
            "UPDATE clients
             SET first_name = ?2, last_name = ?3, phone = ?4, email = ?5, address = ?6, occupation = ?7
             WHERE registration_number = ?1",
        )
        .bind(id)
        .bind(&updated.first_name)
        .bind(&updated.last_name)
        .bind(&updated.phone)
        .bind(&updated.email)
        .bind(&updated.address)
        .bind(&updated.occupation)
        .execute(&mut *tx)
        .await?;

        let client = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(id.to_string()))?;
        tx.commit().await?;

        info!(registration_number = %id, "Client contact details updated");
        Ok(client)
    }

    /// Sets a client's status.
    ///
    /// Staff follow the forward table; admin moves outside it are overrides
    /// and are recorded in the notification log.
    pub async fn set_status(
        &self,
        id: &str,
        target: RecordStatus,
        actor: ActorRole,
    ) -> DbResult<Outcome<Client>> {
        with_retry("set_client_status", move || self.try_set_status(id, target, actor)).await
    }

    async fn try_set_status(
        &self,
        id: &str,
        target: RecordStatus,
        actor: ActorRole,
    ) -> DbResult<Outcome<Client>> {
        let mut tx = self.pool.begin().await?;
        let current = lock_status(&mut tx, id).await?;
        let transition = status::transition(EntityKind::Client, current, target, actor)?;

        if !transition.is_change() {
            tx.rollback().await?;
            return Ok(Outcome::unchanged(self.require(id).await?));
        }

        sqlx::query("UPDATE clients SET status = ?2 WHERE registration_number = ?1")
            .bind(id)
            .bind(transition.to)
            .execute(&mut *tx)
            .await?;

        let client = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(id.to_string()))?;
        let event = Event::client_status(&client, &transition, actor, client.updated_at);
        notification::append(&mut tx, &event).await?;
        tx.commit().await?;

        if transition.is_override() {
            warn!(registration_number = %id, from = %transition.from, to = %transition.to, actor = %actor, "Client status overridden");
        } else {
            info!(registration_number = %id, to = %transition.to, "Client status updated");
        }

        Ok(Outcome::changed(client, event))
    }

    /// Deletes clients with their prescriptions and sales. Admin only.
    ///
    /// Unknown ids are skipped; the outcome lists the ids actually deleted.
    pub async fn bulk_delete(&self, ids: &[String], actor: ActorRole) -> DbResult<Outcome<Vec<String>>> {
        if !actor.is_admin() {
            return Err(CoreError::AdminRequired {
                action: "Deleting clients".to_string(),
            }
            .into());
        }
        if ids.is_empty() {
            return Err(ValidationError::Required {
                field: "ids".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            let removed: Option<String> = sqlx::query_scalar(
                "DELETE FROM clients WHERE registration_number = ?1 RETURNING registration_number",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            deleted.extend(removed);
        }

        if deleted.is_empty() {
            tx.rollback().await?;
            return Ok(Outcome::unchanged(deleted));
        }

        let event = Event::clients_deleted(&deleted, actor, now());
        notification::append(&mut tx, &event).await?;
        tx.commit().await?;

        warn!(count = deleted.len(), actor = %actor, "Clients deleted");
        Ok(Outcome::changed(deleted, event))
    }

    /// Client with latest prescription and all sales.
    pub async fn detail(&self, id: &str) -> DbResult<Option<ClientDetail>> {
        let mut conn = self.pool.acquire().await?;
        let Some(client) = fetch(&mut conn, id).await? else {
            return Ok(None);
        };

        let latest_prescription: Option<Prescription> =
            super::prescription::latest(&mut conn, id).await?;
        let sales: Vec<Sale> = super::sale::for_client(&mut conn, id).await?;

        Ok(Some(ClientDetail {
            client,
            latest_prescription,
            sales,
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{april, db, examined_client, march, new_client, new_prescription, new_sale};
    use crate::{Database, DbConfig};
    use optica_core::{ErrorKind, EventKind};

    #[tokio::test]
    async fn test_register_sequence_and_month_rollover() {
        let db = db().await;
        let repo = db.clients();

        let first = repo.register(new_client("Amani"), march()).await.unwrap();
        let second = repo.register(new_client("Baraka"), march()).await.unwrap();
        let third = repo.register(new_client("Chebet"), april()).await.unwrap();

        assert_eq!(first.record.registration_number, "M/2025/03/1");
        assert_eq!(second.record.registration_number, "M/2025/03/2");
        assert_eq!(third.record.registration_number, "M/2025/04/1");
        assert_eq!(first.record.status, RecordStatus::WaitingExamination);
        assert_eq!(first.event.unwrap().kind, EventKind::NewClient);
    }

    #[tokio::test]
    async fn test_register_validates() {
        let db = db().await;
        let mut bad = new_client("Amani");
        bad.phone = "12".to_string();
        let err = db.clients().register(bad, march()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(ref e) if e.kind() == ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_idempotent_replay() {
        let db = db().await;
        let mut form = new_client("Amani");
        form.idempotency_key = Some("form-7f3a".to_string());

        let first = db.clients().register(form.clone(), march()).await.unwrap();
        let replay = db.clients().register(form, march()).await.unwrap();

        assert_eq!(first.record.registration_number, replay.record.registration_number);
        assert!(replay.event.is_none());
        assert_eq!(db.clients().list(None, 50).await.unwrap().len(), 1);

        let next = db.clients().register(new_client("Baraka"), march()).await.unwrap();
        assert_eq!(next.record.registration_number, "M/2025/03/2");
    }

    #[tokio::test]
    async fn test_list_search() {
        let db = db().await;
        db.clients().register(new_client("Amani"), march()).await.unwrap();
        db.clients().register(new_client("Baraka"), march()).await.unwrap();

        let found = db.clients().list(Some("bara"), 50).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Baraka");

        let by_number = db.clients().list(Some("M/2025/03/1"), 50).await.unwrap();
        assert_eq!(by_number.len(), 1);
        assert_eq!(db.clients().list(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_contact_details() {
        let db = db().await;
        let id = db.clients().register(new_client("Amani"), march()).await.unwrap().record.registration_number;

        let updated = db
            .clients()
            .update(
                &id,
                ClientUpdate {
                    phone: Some("+254 700 111 222".to_string()),
                    email: Some("amani@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.phone, "+254 700 111 222");
        assert_eq!(updated.email.as_deref(), Some("amani@example.com"));
        assert_eq!(updated.registration_number, id);

        let missing = db
            .clients()
            .update("M/1999/01/1", ClientUpdate { phone: Some("0712345678".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(missing, DbError::Domain(CoreError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_status_rules() {
        let db = db().await;
        let id = db.clients().register(new_client("Amani"), march()).await.unwrap().record.registration_number;

        let err = db
            .clients()
            .set_status(&id, RecordStatus::Collected, ActorRole::Staff)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        let same = db
            .clients()
            .set_status(&id, RecordStatus::WaitingExamination, ActorRole::Staff)
            .await
            .unwrap();
        assert!(same.event.is_none());

        let overridden = db
            .clients()
            .set_status(&id, RecordStatus::Registered, ActorRole::Admin)
            .await
            .unwrap();
        assert_eq!(overridden.record.status, RecordStatus::Registered);
        let event = overridden.event.unwrap();
        assert_eq!(event.kind, EventKind::ClientStatusUpdate);
        assert!(event.message.contains("overridden"));
    }

    #[tokio::test]
    async fn test_sale_stages_rejected_on_client() {
        let db = db().await;
        let id = examined_client(&db, "Amani").await;

        for target in [RecordStatus::PendingJob, RecordStatus::JobComplete] {
            for actor in [ActorRole::Staff, ActorRole::Admin] {
                let err = db.clients().set_status(&id, target, actor).await.unwrap_err();
                assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));
            }
        }
        let client = db.clients().get(&id).await.unwrap().unwrap();
        assert_eq!(client.status, RecordStatus::Examined);

        let sale = db.sales().create(new_sale(&id), march()).await.unwrap();
        assert_eq!(sale.record.status, RecordStatus::PendingCollection);

        db.prescriptions().record(new_prescription(&id), april()).await.unwrap();
        let client = db.clients().get(&id).await.unwrap().unwrap();
        assert_eq!(client.status, RecordStatus::Examined);
    }

    #[tokio::test]
    async fn test_bulk_delete_is_admin_only_and_cascades() {
        let db = db().await;
        let id = examined_client(&db, "Amani").await;
        db.sales().create(new_sale(&id), march()).await.unwrap();

        let err = db.clients().bulk_delete(&[id.clone()], ActorRole::Staff).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(ref e) if e.kind() == ErrorKind::Forbidden));

        let outcome = db
            .clients()
            .bulk_delete(&[id.clone(), "M/1999/01/1".to_string()], ActorRole::Admin)
            .await
            .unwrap();
        assert_eq!(outcome.record, vec![id.clone()]);
        assert_eq!(outcome.event.unwrap().kind, EventKind::ClientsDeleted);
        assert!(db.clients().get(&id).await.unwrap().is_none());
        assert!(db.sales().list(None, None, 50).await.unwrap().is_empty());

        // Numbers are not reused after a delete.
        let next = db.clients().register(new_client("Baraka"), march()).await.unwrap();
        assert_eq!(next.record.registration_number, "M/2025/03/2");
    }

    #[tokio::test]
    async fn test_detail() {
        let db = db().await;
        let id = examined_client(&db, "Amani").await;
        db.sales().create(new_sale(&id), march()).await.unwrap();

        let detail = db.clients().detail(&id).await.unwrap().unwrap();
        assert_eq!(detail.client.status, RecordStatus::Examined);
        assert!(detail.latest_prescription.is_some());
        assert_eq!(detail.sales.len(), 1);
        assert!(db.clients().detail("M/1999/01/1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_distinct_and_gapless() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("optica.db")).max_connections(4))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.clients()
                        .register(new_client(&format!("Client{i}")), march())
                        .await
                        .map(|o| o.record.registration_number)
                })
            })
            .collect();

        let mut numbers = Vec::new();
        for result in futures_util::future::join_all(tasks).await {
            numbers.push(result.unwrap().unwrap());
        }

        let mut sequences: Vec<u64> = numbers
            .iter()
            .map(|n| db.templates().client().parse(n).unwrap().sequence)
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=16).collect::<Vec<u64>>());
    }
}
