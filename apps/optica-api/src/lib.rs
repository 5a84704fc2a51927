//! # optica-api: HTTP Surface of the Optical Shop
//!
//! Thin axum layer over `optica-db`: handlers parse input, call one
//! repository operation, publish the resulting event and serialize.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /sales  { client_id: "M/2025/03/1", ... }                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  TraceLayer ──► CorsLayer ──► routes::sales::create                     │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                     db.sales().create(form, today)                      │
//! │                       (one transaction: client check, reference         │
//! │                        allocation, insert, notification row)            │
//! │                                   │                                     │
//! │                    ┌──────────────┴──────────────┐                      │
//! │                    ▼                             ▼                      │
//! │       events.send(newSale) ──► /ws     200 { success: true, sale }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod api_types;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ErrorCode};
pub use routes::build_router;
pub use state::AppState;

/// Router with the tracing and CORS layers applied.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
