//! # optica-db: Database Layer for the Optical Shop
//!
//! SQLite persistence with sqlx: pool, embedded migrations and repositories.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  optica-api handler (POST /clients)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     optica-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ client, sale,  │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │◄───│ prescription,  │    │ 001_initial  │  │   │
//! │  │   │ IdTemplates   │    │ sequence, ...  │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optica_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("optica.db")).await?;
//! let outcome = db.clients().register(form, today).await?;
//! println!("{}", outcome.record.registration_number); // M/2025/03/1
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::Outcome;

pub use repository::client::ClientRepository;
pub use repository::notification::NotificationRepository;
pub use repository::prescription::PrescriptionRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::sequence::SequenceRepository;
