//! # Sequence Counters
//!
//! One authoritative counter per identifier bucket.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate(tx, Sale, "SALE/{year}/{month}/{seq:3}", 2025-03-14)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  bucket key "sale:SALE/2025/03/"                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE sequence_counters SET last_value = last_value + 1              │
//! │   WHERE bucket = ? RETURNING last_value                                │
//! │       │                                                                 │
//! │       ├── row ──► sequence = last_value                                │
//! │       │                                                                 │
//! │       └── none ─► find_last_identifier("SALE/2025/03/")                 │
//! │                     │  (rows created before the counter existed)        │
//! │                     ▼                                                   │
//! │                   IdTemplate::next_sequence ─► INSERT counter row      │
//! │                                                                         │
//! │  Output: SALE/2025/03/001                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The UPDATE runs first in the transaction, so the SQLite write lock is held
//! before anything is read. Two concurrent seeders collide on the counter's
//! primary key and the loser retries.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use optica_core::{EntityKind, IdTemplate, IdTemplates, Identifier};

use crate::error::{DbError, DbResult};

fn table_and_column(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::Client => ("clients", "registration_number"),
        EntityKind::Sale => ("sales", "reference_number"),
    }
}

fn to_sequence(value: i64) -> DbResult<u64> {
    u64::try_from(value).map_err(|_| DbError::Internal(format!("negative counter value {}", value)))
}

fn to_counter(sequence: u64) -> DbResult<i64> {
    i64::try_from(sequence).map_err(|_| DbError::Internal(format!("counter overflow at {}", sequence)))
}

/// Highest stored identifier starting with `bucket`.
///
/// Ordered by length first so an unpadded `M/2025/03/10` beats `M/2025/03/9`.
pub async fn find_last_identifier(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    bucket: &str,
) -> DbResult<Option<String>> {
    let (table, column) = table_and_column(kind);
    let sql = format!(
        "SELECT {column} FROM {table}
         WHERE substr({column}, 1, length(?1)) = ?1
         ORDER BY length({column}) DESC, {column} DESC
         LIMIT 1"
    );

    let last: Option<String> = sqlx::query_scalar(&sql)
        .bind(bucket)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(last)
}

/// Allocates the next identifier for `kind` on `date`.
///
/// Must run inside the transaction that inserts the record.
pub async fn allocate(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    template: &IdTemplate,
    date: NaiveDate,
) -> DbResult<Identifier> {
    let bucket = template.bucket(date);
    let key = kind.counter_key(&bucket);
    let now = super::now();

    let bumped: Option<i64> = sqlx::query_scalar(
        "UPDATE sequence_counters
         SET last_value = last_value + 1, updated_at = ?2
         WHERE bucket = ?1
         RETURNING last_value",
    )
    .bind(&key)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    let sequence = match bumped {
        Some(value) => to_sequence(value)?,
        None => {
            let last = find_last_identifier(conn, kind, &bucket).await?;
            let sequence = template.next_sequence(&bucket, last.as_deref())?;
            debug!(bucket = %key, seeded_from = ?last, sequence, "Seeding sequence counter");

            sqlx::query(
                "INSERT INTO sequence_counters (bucket, last_value, updated_at)
                 VALUES (?1, ?2, ?3)",
            )
            .bind(&key)
            .bind(to_counter(sequence)?)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            sequence
        }
    };

    Ok(template.identifier(date, sequence))
}

/// Read-only access to counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
    templates: IdTemplates,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool, templates: IdTemplates) -> Self {
        SequenceRepository { pool, templates }
    }

    /// Previews the identifier the next record of `kind` would get on `date`.
    ///
    /// Nothing is reserved; a concurrent registration may take it first.
    pub async fn peek(&self, kind: EntityKind, date: NaiveDate) -> DbResult<Identifier> {
        let template = self.templates.for_kind(kind);
        let bucket = template.bucket(date);
        let mut conn = self.pool.acquire().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM sequence_counters WHERE bucket = ?1")
                .bind(kind.counter_key(&bucket))
                .fetch_optional(&mut *conn)
                .await?;

        let sequence = match current {
            Some(value) => to_sequence(value)? + 1,
            None => {
                let last = find_last_identifier(&mut conn, kind, &bucket).await?;
                template.next_sequence(&bucket, last.as_deref())?
            }
        };

        Ok(template.identifier(date, sequence))
    }

    /// Last allocated sequence in the bucket for `date`, if any.
    pub async fn current(&self, kind: EntityKind, date: NaiveDate) -> DbResult<Option<u64>> {
        let bucket = self.templates.for_kind(kind).bucket(date);
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM sequence_counters WHERE bucket = ?1")
                .bind(kind.counter_key(&bucket))
                .fetch_optional(&self.pool)
                .await?;
        value.map(to_sequence).transpose()
    }
}

// =============================================================================
// Tests
// =============================================================================
