//! # optica-core: Pure Business Logic for the Optical Shop
//!
//! Identifier generation, the record lifecycle and sale arithmetic, with no
//! I/O of any kind. Dates and clocks are passed in by the caller.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Optica Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Front end (registration / exam / sales forms)      │   │
//! │  └──────────────────────┬──────────────────────────▲───────────────┘   │
//! │                         │ REST                     │ /ws events         │
//! │  ┌──────────────────────▼──────────────────────────┴───────────────┐   │
//! │  │                    optica-api (axum)                            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ optica-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐ │   │
//! │  │   │ identifier │  │  status   │  │   sale    │  │ validation│ │   │
//! │  │   │ IdTemplate │  │ Transition│  │  Money    │  │   rules   │ │   │
//! │  │   └────────────┘  └───────────┘  └───────────┘  └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                optica-db (SQLite repositories)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`identifier`] - Registration/reference number templates
//! - [`status`] - Record status state machine
//! - [`money`] / [`sale`] - Integer money and derived sale amounts
//! - [`event`] - Event descriptors returned by state changes
//! - [`types`] - Domain records and input forms
//! - [`validation`] - Field validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use optica_core::identifier::IdTemplate;
//!
//! let template: IdTemplate = "SALE/{year}/{month}/{seq:3}".parse().unwrap();
//! let march = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
//!
//! let first = template
//!     .next_identifier(march, |_prefix| Ok::<_, optica_core::CoreError>(None))
//!     .unwrap();
//! assert_eq!(first.value, "SALE/2025/03/001");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod event;
pub mod identifier;
pub mod money;
pub mod sale;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, IdentifierError, ValidationError};
pub use event::{Event, EventKind};
pub use identifier::{EntityKind, IdTemplate, IdTemplates, Identifier};
pub use money::Money;
pub use sale::SaleAmounts;
pub use status::{ActorRole, RecordStatus, Transition, TransitionKind};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default page size for list operations.
pub const DEFAULT_LIST_LIMIT: u32 = 50;
