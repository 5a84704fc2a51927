//! # Record Status State Machine
//!
//! One shared status enum for clients and sales. Each record kind has its
//! own slice of the vocabulary and its own table of forward moves.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Record Lifecycle                                 │
//! │                                                                         │
//! │  CLIENT RECORD                                                         │
//! │   registered ──► waiting_examination ──► examined                      │
//! │   (automatic on      (prescription saved)     │                         │
//! │    registration)                              │ sale created            │
//! │                                               ▼                         │
//! │  SALE RECORD              ┌───────────────────┴──────────┐             │
//! │                           │ requires_job                 │ ready stock  │
//! │                           ▼                              │              │
//! │                      pending_job                         │              │
//! │                           │ lab finished                 │              │
//! │                           ▼                              │              │
//! │                      job_complete                        │              │
//! │                           │                              │              │
//! │                           ▼                              ▼              │
//! │                      pending_collection ◄────────────────┘              │
//! │                           │ customer picks up                           │
//! │                           ▼                                             │
//! │                       collected                                         │
//! │                                                                         │
//! │  Staff/System: forward table only, no skipping.                         │
//! │  Admin: any status of the record's kind; non-forward moves are          │
//! │  overrides (audited). Sale stages are never valid on a client.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::identifier::EntityKind;

// =============================================================================
// Record Status
// =============================================================================

/// Processing stage of a client or sale record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Client details captured.
    #[default]
    Registered,
    /// Client is queued for the optometrist.
    WaitingExamination,
    /// A prescription has been recorded.
    Examined,
    /// Sold; lenses are being made.
    PendingJob,
    /// Lab work finished.
    JobComplete,
    /// Ready for the customer to pick up.
    PendingCollection,
    /// Handed over to the customer.
    Collected,
}

impl RecordStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [RecordStatus; 7] = [
        RecordStatus::Registered,
        RecordStatus::WaitingExamination,
        RecordStatus::Examined,
        RecordStatus::PendingJob,
        RecordStatus::JobComplete,
        RecordStatus::PendingCollection,
        RecordStatus::Collected,
    ];

    /// Stored / serialized name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Registered => "registered",
            RecordStatus::WaitingExamination => "waiting_examination",
            RecordStatus::Examined => "examined",
            RecordStatus::PendingJob => "pending_job",
            RecordStatus::JobComplete => "job_complete",
            RecordStatus::PendingCollection => "pending_collection",
            RecordStatus::Collected => "collected",
        }
    }

    /// Whether a record of `kind` may carry this status.
    pub const fn applies_to(&self, kind: EntityKind) -> bool {
        match self {
            RecordStatus::Registered | RecordStatus::WaitingExamination | RecordStatus::Examined => {
                matches!(kind, EntityKind::Client)
            }
            RecordStatus::PendingJob
            | RecordStatus::JobComplete
            | RecordStatus::PendingCollection
            | RecordStatus::Collected => matches!(kind, EntityKind::Sale),
        }
    }

    /// Statuses a client record reaches from this one without an override.
    pub const fn client_forward_targets(&self) -> &'static [RecordStatus] {
        match self {
            RecordStatus::Registered => &[RecordStatus::WaitingExamination],
            RecordStatus::WaitingExamination => &[RecordStatus::Examined],
            _ => &[],
        }
    }

    /// Statuses a sale record reaches from this one without an override.
    pub const fn sale_forward_targets(&self) -> &'static [RecordStatus] {
        match self {
            RecordStatus::PendingJob => &[RecordStatus::JobComplete],
            RecordStatus::JobComplete => &[RecordStatus::PendingCollection],
            RecordStatus::PendingCollection => &[RecordStatus::Collected],
            _ => &[],
        }
    }

    pub const fn forward_targets(&self, kind: EntityKind) -> &'static [RecordStatus] {
        match kind {
            EntityKind::Client => self.client_forward_targets(),
            EntityKind::Sale => self.sale_forward_targets(),
        }
    }

    /// Whether `target` is in the forward table of `kind`.
    pub fn can_advance_to(&self, kind: EntityKind, target: RecordStatus) -> bool {
        self.forward_targets(kind).contains(&target)
    }

    /// Whether no forward move leaves this status for a record of `kind`.
    pub fn is_terminal(&self, kind: EntityKind) -> bool {
        self.forward_targets(kind).is_empty()
    }

    fn allowed_names() -> Vec<String> {
        RecordStatus::ALL
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ValidationError;

    /// Parses a status name.
    ///
    /// Case-insensitive; `-` and spaces are read as `_`, and `sold` is
    /// accepted for `pending_job`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "registered" => Ok(RecordStatus::Registered),
            "waiting_examination" => Ok(RecordStatus::WaitingExamination),
            "examined" => Ok(RecordStatus::Examined),
            "pending_job" | "sold" => Ok(RecordStatus::PendingJob),
            "job_complete" => Ok(RecordStatus::JobComplete),
            "pending_collection" => Ok(RecordStatus::PendingCollection),
            "collected" => Ok(RecordStatus::Collected),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                value: s.to_string(),
                allowed: RecordStatus::allowed_names(),
            }),
        }
    }
}

// =============================================================================
// Actor Role
// =============================================================================

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// Front desk / optometrist / lab staff.
    #[default]
    Staff,
    /// Administrator, may correct any status.
    Admin,
    /// Automatic transitions made by the system itself.
    System,
}

impl ActorRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Staff => "staff",
            ActorRole::Admin => "admin",
            ActorRole::System => "system",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ActorRole::Admin)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "staff" => Ok(ActorRole::Staff),
            "admin" => Ok(ActorRole::Admin),
            "system" => Ok(ActorRole::System),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                value: s.to_string(),
                allowed: vec!["staff".to_string(), "admin".to_string(), "system".to_string()],
            }),
        }
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// How a requested status change was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Listed in the forward table.
    Forward,
    /// Admin correction outside the forward table.
    Override,
    /// Target equals the current status; nothing to write.
    Unchanged,
}

/// An accepted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transition {
    pub from: RecordStatus,
    pub to: RecordStatus,
    pub kind: TransitionKind,
}

impl Transition {
    /// Whether the record's stored status changes.
    pub fn is_change(&self) -> bool {
        !matches!(self.kind, TransitionKind::Unchanged)
    }

    pub fn is_override(&self) -> bool {
        matches!(self.kind, TransitionKind::Override)
    }
}

/// Validates a requested status change on a record of `record`.
///
/// ## Rules
/// ```text
/// target not valid for record  → InvalidTransition (any actor)
/// current == target            → Unchanged (any actor)
/// target in forward table      → Forward   (any actor)
/// otherwise, actor is Admin    → Override
/// otherwise                    → InvalidTransition
/// ```
pub fn transition(
    record: EntityKind,
    current: RecordStatus,
    target: RecordStatus,
    actor: ActorRole,
) -> CoreResult<Transition> {
    if !target.applies_to(record) {
        return Err(CoreError::InvalidTransition {
            from: current,
            to: target,
            actor,
        });
    }

    let kind = if current == target {
        TransitionKind::Unchanged
    } else if current.can_advance_to(record, target) {
        TransitionKind::Forward
    } else if actor.is_admin() {
        TransitionKind::Override
    } else {
        return Err(CoreError::InvalidTransition {
            from: current,
            to: target,
            actor,
        });
    };

    Ok(Transition {
        from: current,
        to: target,
        kind,
    })
}

/// Parses a status name and validates the move in one step.
pub fn transition_to(
    record: EntityKind,
    current: RecordStatus,
    target: &str,
    actor: ActorRole,
) -> CoreResult<Transition> {
    let target: RecordStatus = target.parse()?;
    transition(record, current, target, actor)
}

/// Status a freshly registered client is stored with.
pub fn on_registration() -> Transition {
    Transition {
        from: RecordStatus::Registered,
        to: RecordStatus::WaitingExamination,
        kind: TransitionKind::Forward,
    }
}

/// Status change caused by saving a prescription.
///
/// A client who was already examined is being re-examined; the status stays.
pub fn on_examination(current: RecordStatus) -> CoreResult<Transition> {
    transition(EntityKind::Client, current, RecordStatus::Examined, ActorRole::System)
}

/// Initial status of a new sale for a client in `client_status`.
///
/// The client must have been examined. Lab orders start at `pending_job`,
/// ready-stock orders at `pending_collection`.
pub fn sale_entry_status(
    client_id: &str,
    client_status: RecordStatus,
    requires_job: bool,
) -> CoreResult<RecordStatus> {
    if client_status != RecordStatus::Examined {
        return Err(CoreError::NotExamined {
            client_id: client_id.to_string(),
            status: client_status,
        });
    }

    Ok(if requires_job {
        RecordStatus::PendingJob
    } else {
        RecordStatus::PendingCollection
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
