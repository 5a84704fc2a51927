//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (rule violations)         │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ← categorized, knows what is retryable          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (optica-api) ← status code + JSON body                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Retryable Errors
//! A busy database and a collision on a freshly allocated identifier are
//! retried by the repositories with a fresh read. Everything else surfaces.

use optica_core::{CoreError, IdentifierError, ValidationError};
use thiserror::Error;

/// SQLite primary/extended result codes that mean "try again".
///
/// 5 = SQLITE_BUSY, 6 = SQLITE_LOCKED, 261 = BUSY_RECOVERY,
/// 517 = BUSY_SNAPSHOT, 773 = BUSY_TIMEOUT.
const BUSY_CODES: &[&str] = &["5", "6", "261", "517", "773"];

/// Unique columns whose violation means a concurrent writer won a race.
const RACE_COLUMNS: &[&str] = &[
    "clients.registration_number",
    "sales.reference_number",
    "sequence_counters.bucket",
    "clients.idempotency_key",
    "sales.idempotency_key",
];

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Row not found where one was required.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two writers allocated the same identifier (retried)
    /// - Idempotency key replayed concurrently (retried)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (sale amount equations, status values).
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database busy or locked by another writer.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether repeating the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Busy(_) => true,
            DbError::UniqueViolation { field, .. } => RACE_COLUMNS.contains(&field.as_str()),
            _ => false,
        }
    }

    /// Whether the store itself is unavailable or overloaded.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_)
                | DbError::ConnectionFailed(_)
                | DbError::PoolExhausted
                | DbError::MigrationFailed(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → by result code, then constraint message
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if code.as_deref().is_some_and(|c| BUSY_CODES.contains(&c))
                    || msg.contains("database is locked")
                {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

impl From<IdentifierError> for DbError {
    fn from(err: IdentifierError) -> Self {
        DbError::Domain(CoreError::Identifier(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(DbError::Busy("database is locked".into()).is_retryable());
        assert!(DbError::duplicate("sales.reference_number", "SALE/2025/03/001").is_retryable());
        assert!(!DbError::duplicate("clients.phone", "0712").is_retryable());
        assert!(!DbError::PoolExhausted.is_retryable());
        assert!(DbError::PoolExhausted.is_infrastructure());
    }

    #[test]
    fn test_domain_passthrough() {
        let err: DbError = CoreError::SaleNotFound("x".into()).into();
        assert_eq!(err.to_string(), "Sale not found: x");
    }
}
