//! # Error Types
//!
//! Domain-specific error types for optica-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  optica-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── IdentifierError  - Template / stored identifier problems          │
//! │                                                                         │
//! │  optica-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  optica-api errors (app)                                               │
//! │  └── ApiError         - What the front end sees (serialized)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Frontend     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Classification
//! Every [`CoreError`] reports an [`ErrorKind`] so the REST boundary can pick
//! a status code without string matching.

use thiserror::Error;

use crate::status::{ActorRole, RecordStatus};

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification used by outer layers to choose a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; not retried.
    Validation,
    /// Referenced record does not exist.
    NotFound,
    /// Request is well-formed but the records are not in a state that allows it.
    Precondition,
    /// Stored data contradicts an invariant (malformed identifier, collision).
    Integrity,
    /// Caller lacks the role required for the action.
    Forbidden,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Client with the given registration number does not exist.
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Prescription does not exist.
    #[error("Prescription not found: {0}")]
    PrescriptionNotFound(String),

    /// Sale does not exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// The requested status change is not in the forward table for this actor.
    ///
    /// ## When This Occurs
    /// - Staff skipping a stage (`pending_job` → `collected`)
    /// - Staff moving a record backwards
    /// - Admin overrides are never rejected here
    #[error("Cannot move from {from} to {to} as {actor}")]
    InvalidTransition {
        from: RecordStatus,
        to: RecordStatus,
        actor: ActorRole,
    },

    /// A sale was requested for a client who has not been examined.
    #[error("Client {client_id} is {status}, an examination is required before a sale")]
    NotExamined {
        client_id: String,
        status: RecordStatus,
    },

    /// A sale was requested but the client has no prescription on file.
    #[error("Client {client_id} has no recorded prescription")]
    NoPrescription { client_id: String },

    /// A sale referenced a prescription id that does not exist.
    #[error("Prescription {prescription_id} does not exist")]
    UnknownPrescription { prescription_id: String },

    /// The referenced prescription belongs to another client.
    #[error("Prescription {prescription_id} does not belong to client {client_id}")]
    PrescriptionMismatch {
        prescription_id: String,
        client_id: String,
    },

    /// Action restricted to administrators.
    #[error("{action} requires the admin role")]
    AdminRequired { action: String },

    /// Identifier template or stored identifier problem.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ClientNotFound(_)
            | CoreError::PrescriptionNotFound(_)
            | CoreError::SaleNotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidTransition { .. }
            | CoreError::NotExamined { .. }
            | CoreError::NoPrescription { .. }
            | CoreError::UnknownPrescription { .. }
            | CoreError::PrescriptionMismatch { .. } => ErrorKind::Precondition,
            CoreError::AdminRequired { .. } => ErrorKind::Forbidden,
            CoreError::Identifier(IdentifierError::InvalidTemplate { .. }) => ErrorKind::Validation,
            CoreError::Identifier(IdentifierError::Malformed { .. }) => ErrorKind::Integrity,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: String, max: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} '{value}' is not valid, must be one of: {}", allowed.join(", "))]
    NotAllowed {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    /// Two fields contradict each other.
    #[error("{0}")]
    Inconsistent(String),
}

// =============================================================================
// Identifier Error
// =============================================================================

/// Identifier template and stored identifier errors.
#[derive(Debug, Error)]
pub enum IdentifierError {
    /// The configured template cannot be used.
    #[error("Invalid identifier template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// A stored identifier does not follow its template.
    ///
    /// ## When This Occurs
    /// - Legacy rows typed by hand (`M/2025/03/1a`)
    /// - A row whose prefix does not match the bucket it was found under
    ///
    /// This is never defaulted to sequence 1; doing so would hand out a
    /// duplicate registration number.
    #[error("Malformed identifier '{identifier}': {reason}")]
    Malformed { identifier: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            from: RecordStatus::PendingJob,
            to: RecordStatus::Collected,
            actor: ActorRole::Staff,
        };
        assert_eq!(
            err.to_string(),
            "Cannot move from pending_job to collected as staff"
        );
    }

    #[test]
    fn test_not_allowed_lists_values() {
        let err = ValidationError::NotAllowed {
            field: "status".to_string(),
            value: "lost".to_string(),
            allowed: vec!["registered".to_string(), "collected".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "status 'lost' is not valid, must be one of: registered, collected"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::ClientNotFound("M/2025/03/1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::NoPrescription {
                client_id: "M/2025/03/1".into()
            }
            .kind(),
            ErrorKind::Precondition
        );
        let malformed: CoreError = IdentifierError::Malformed {
            identifier: "M/2025/03/x".into(),
            reason: "not numeric".into(),
        }
        .into();
        assert_eq!(malformed.kind(), ErrorKind::Integrity);
        let validation: CoreError = ValidationError::Required {
            field: "phone".into(),
        }
        .into();
        assert_eq!(validation.kind(), ErrorKind::Validation);
    }
}
