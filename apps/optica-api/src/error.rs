//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler  Result<Json<T>, ApiError>                                     │
//! │     │                                                                   │
//! │     ├── ValidationError ──► CoreError ──► DbError ──┐                   │
//! │     │                                               ▼                   │
//! │     │                                   ApiError { status, code, msg }  │
//! │     │                                               │                   │
//! │     ▼                                               ▼                   │
//! │  200 { "success": true, ... }    4xx/5xx { "success": false,            │
//! │                                            "error": "...",              │
//! │                                            "code": "NOT_FOUND" }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Kind | Status | Code |
//! |------|--------|------|
//! | validation | 400 | `VALIDATION_ERROR` |
//! | forbidden | 403 | `FORBIDDEN` |
//! | not found | 404 | `NOT_FOUND` |
//! | integrity | 409 | `CONFLICT` |
//! | precondition | 422 | `PRECONDITION_FAILED` |
//! | infrastructure | 503 | `UNAVAILABLE` |
//! | anything else | 500 | `INTERNAL` |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use optica_core::{CoreError, ErrorKind, ValidationError};
use optica_db::DbError;

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Admin-only action (403)
    Forbidden,

    /// Resource not found (404)
    NotFound,

    /// Duplicate or conflicting record (409)
    Conflict,

    /// Records are not in a state that allows the request (422)
    PreconditionFailed,

    /// Database busy, pool exhausted or unreachable (503)
    Unavailable,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::PreconditionFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Validation => ErrorCode::ValidationError,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Precondition => ErrorCode::PreconditionFailed,
            ErrorKind::Integrity => ErrorCode::Conflict,
            ErrorKind::Forbidden => ErrorCode::Forbidden,
        }
    }
}

/// API error returned from handlers.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    code: ErrorCode,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: &self.message,
            code: self.code,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => ApiError::from(core),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ApiError::new(ErrorCode::Conflict, err.to_string())
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Check constraint violation: {}", message);
                ApiError::new(ErrorCode::Conflict, "Record violates a stored constraint")
            }
            err if err.is_infrastructure() => {
                tracing::error!(error = %err, "Database unavailable");
                ApiError::new(ErrorCode::Unavailable, "Database is busy or unavailable, try again")
            }
            err => {
                // Log the actual error but return a generic message
                tracing::error!(error = %err, "Database operation failed");
                ApiError::new(ErrorCode::Internal, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = ErrorCode::from(err.kind());
        if code == ErrorCode::Conflict {
            tracing::error!(error = %err, "Stored data violates an invariant");
        }
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optica_core::{ActorRole, IdentifierError, RecordStatus};

    #[test]
    fn test_core_mapping() {
        let err = ApiError::from(CoreError::ClientNotFound("M/2025/03/9".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(CoreError::InvalidTransition {
            from: RecordStatus::WaitingExamination,
            to: RecordStatus::Collected,
            actor: ActorRole::Staff,
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, ErrorCode::PreconditionFailed);

        let err = ApiError::from(CoreError::AdminRequired {
            action: "bulk delete".into(),
        });
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = ApiError::from(CoreError::Identifier(IdentifierError::Malformed {
            identifier: "M/2025/03/x".into(),
            reason: "sequence is not a number".into(),
        }));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_db_mapping() {
        assert_eq!(ApiError::from(DbError::PoolExhausted).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::from(DbError::Busy("database is locked".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(DbError::duplicate("clients.phone", "0712")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DbError::QueryFailed("syntax".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err = ApiError::from(DbError::Domain(CoreError::SaleNotFound("x".into())));
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_validation_mapping() {
        let err = ApiError::from(ValidationError::Required {
            field: "first_name".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
