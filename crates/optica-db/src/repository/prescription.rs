//! # Prescription Repository
//!
//! Examinations. Saving one moves the client from `waiting_examination` to
//! `examined`; a re-examination of an examined client leaves the status as
//! it is.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use optica_core::status;
use optica_core::{CoreError, Event, NewPrescription, Prescription};

use super::{client, notification, now, with_retry, Outcome};
use crate::error::DbResult;

pub(crate) const PRESCRIPTION_COLUMNS: &str = "id, client_id, \
     right_sphere, right_cylinder, right_axis, right_addition, right_visual_acuity, \
     left_sphere, left_cylinder, left_axis, left_addition, left_visual_acuity, \
     pupillary_distance, clinical_history, examined_by, exam_date, created_at";

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Prescription>> {
    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1");
    let prescription = sqlx::query_as::<_, Prescription>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(prescription)
}

/// Latest prescription of a client by exam date, then by when it was saved.
pub(crate) async fn latest(conn: &mut SqliteConnection, client_id: &str) -> DbResult<Option<Prescription>> {
    let sql = format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
         WHERE client_id = ?1
         ORDER BY exam_date DESC, created_at DESC, rowid DESC
         LIMIT 1"
    );
    let prescription = sqlx::query_as::<_, Prescription>(&sql)
        .bind(client_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(prescription)
}

/// Repository for examinations.
#[derive(Debug, Clone)]
pub struct PrescriptionRepository {
    pool: SqlitePool,
}

impl PrescriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PrescriptionRepository { pool }
    }

    /// Records an examination for an existing client.
    pub async fn record(&self, new: NewPrescription, today: NaiveDate) -> DbResult<Outcome<Prescription>> {
        let new = new.validate(today)?;
        let new = &new;
        with_retry("record_prescription", move || self.try_record(new, today)).await
    }

    async fn try_record(&self, new: &NewPrescription, today: NaiveDate) -> DbResult<Outcome<Prescription>> {
        let mut tx = self.pool.begin().await?;

        let current = client::lock_status(&mut tx, &new.client_id).await?;
        let transition = status::on_examination(current)?;
        if transition.is_change() {
            sqlx::query("UPDATE clients SET status = ?2 WHERE registration_number = ?1")
                .bind(&new.client_id)
                .bind(transition.to)
                .execute(&mut *tx)
                .await?;
        }

        let now = now();
        let prescription = Prescription {
            id: Uuid::new_v4().to_string(),
            client_id: new.client_id.clone(),
            right_sphere: new.right.sphere,
            right_cylinder: new.right.cylinder,
            right_axis: new.right.axis,
            right_addition: new.right.addition,
            right_visual_acuity: new.right.visual_acuity.clone(),
            left_sphere: new.left.sphere,
            left_cylinder: new.left.cylinder,
            left_axis: new.left.axis,
            left_addition: new.left.addition,
            left_visual_acuity: new.left.visual_acuity.clone(),
            pupillary_distance: new.pupillary_distance,
            clinical_history: new.clinical_history.clone(),
            examined_by: new.examined_by.clone(),
            exam_date: new.exam_date.unwrap_or(today),
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO prescriptions (id, client_id,
                 right_sphere, right_cylinder, right_axis, right_addition, right_visual_acuity,
                 left_sphere, left_cylinder, left_axis, left_addition, left_visual_acuity,
                 pupillary_distance, clinical_history, examined_by, exam_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&prescription.id)
        .bind(&prescription.client_id)
        .bind(prescription.right_sphere)
        .bind(prescription.right_cylinder)
        .bind(prescription.right_axis)
        .bind(prescription.right_addition)
        .bind(&prescription.right_visual_acuity)
        .bind(prescription.left_sphere)
        .bind(prescription.left_cylinder)
        .bind(prescription.left_axis)
        .bind(prescription.left_addition)
        .bind(&prescription.left_visual_acuity)
        .bind(prescription.pupillary_distance)
        .bind(&prescription.clinical_history)
        .bind(&prescription.examined_by)
        .bind(prescription.exam_date)
        .bind(prescription.created_at)
        .execute(&mut *tx)
        .await?;

        let client = client::fetch(&mut tx, &new.client_id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(new.client_id.clone()))?;
        let event = Event::new_prescription(&prescription, &client, now);
        notification::append(&mut tx, &event).await?;
        tx.commit().await?;

        info!(
            prescription_id = %prescription.id,
            registration_number = %client.registration_number,
            client_status = %client.status,
            "Prescription recorded"
        );
        Ok(Outcome::changed(prescription, event))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Prescription>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Like [`get`](Self::get) but a missing prescription is an error.
    pub async fn require(&self, id: &str) -> DbResult<Prescription> {
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::PrescriptionNotFound(id.to_string()).into())
    }

    /// Examination history, newest exam first.
    pub async fn list_for_client(&self, client_id: &str) -> DbResult<Vec<Prescription>> {
        let sql = format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
             WHERE client_id = ?1
             ORDER BY exam_date DESC, created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, Prescription>(&sql)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn latest_for_client(&self, client_id: &str) -> DbResult<Option<Prescription>> {
        let mut conn = self.pool.acquire().await?;
        latest(&mut conn, client_id).await
    }
}

// =============================================================================
// Tests
// =============================================================================
