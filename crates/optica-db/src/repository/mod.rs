//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.clients().register(form, today)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  with_retry ──────────────────────────────────┐ busy / id collision    │
//! │       │                                        │ (max 3 attempts)       │
//! │       ▼                                        │                        │
//! │  BEGIN                                         │                        │
//! │    UPDATE sequence_counters ... RETURNING  ◄── first statement writes  │
//! │    INSERT INTO clients ...                     │                        │
//! │    INSERT INTO notifications ...               │                        │
//! │  COMMIT ───────────────────────────────────────┘                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Outcome { record, event } ──► API publishes the event                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ClientRepository`](client::ClientRepository) - registration, status, bulk delete
//! - [`PrescriptionRepository`](prescription::PrescriptionRepository) - examinations
//! - [`SaleRepository`](sale::SaleRepository) - orders, amounts, status
//! - [`NotificationRepository`](notification::NotificationRepository) - event side log
//! - [`SequenceRepository`](sequence::SequenceRepository) - identifier counters
//! - [`ReportRepository`](report::ReportRepository) - dashboard figures

use std::future::Future;
use std::time::Duration;

use optica_core::Event;
use tracing::warn;

use crate::error::DbResult;

pub mod client;
pub mod notification;
pub mod prescription;
pub mod report;
pub mod sale;
pub mod sequence;

/// Attempts per write operation before a retryable error is surfaced.
pub const MAX_ATTEMPTS: u32 = 3;

/// Result of a state-changing operation.
///
/// `event` is `None` when nothing changed (same-status request, idempotent
/// replay).
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub record: T,
    pub event: Option<Event>,
}

impl<T> Outcome<T> {
    pub fn changed(record: T, event: Event) -> Self {
        Outcome {
            record,
            event: Some(event),
        }
    }

    pub fn unchanged(record: T) -> Self {
        Outcome { record, event: None }
    }
}

/// Runs `op` again while it fails with a retryable error.
///
/// Each attempt must be a complete transaction so a retry re-reads everything.
pub(crate) async fn with_retry<T, F, Fut>(operation: &'static str, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                warn!(operation, attempt, error = %err, "Retrying transaction");
                tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Current time truncated to milliseconds, as stored.
pub(crate) fn now() -> chrono::DateTime<chrono::Utc> {
    use chrono::{SubsecRound, Utc};
    Utc::now().trunc_subsecs(3)
}
