//! # HTTP Routes
//!
//! ## Route Organization
//! ```text
//! routes/
//! ├── mod.rs            ◄─── Router, extractors
//! ├── clients.rs        ◄─── Registration, search, status, bulk delete
//! ├── prescriptions.rs  ◄─── Examinations
//! ├── sales.rs          ◄─── Sales, amounts, status
//! ├── notifications.rs  ◄─── Event side log
//! ├── dashboard.rs      ◄─── Health and summary figures
//! └── ws.rs             ◄─── Live event stream
//! ```
//!
//! Identifiers contain `/`, so clients send them percent-encoded
//! (`/clients/M%2F2025%2F03%2F1`). The router matches on the encoded path
//! and `Path` hands handlers the decoded value.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;

use optica_core::ActorRole;

use crate::error::ApiError;
use crate::state::AppState;

pub mod clients;
pub mod dashboard;
pub mod notifications;
pub mod prescriptions;
pub mod sales;
pub mod ws;

/// Header carrying the caller's role.
pub const ACTOR_HEADER: &str = "x-actor-role";

/// Builds the application router (without outer layers).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(dashboard::health))
        .route("/dashboard/summary", get(dashboard::summary))
        // Clients
        .route("/clients", get(clients::list).post(clients::register))
        .route("/clients/next-id", get(clients::next_id))
        .route("/clients/bulk-delete", post(clients::bulk_delete))
        .route("/clients/{id}", get(clients::detail).put(clients::update))
        .route("/clients/{id}/status", patch(clients::set_status))
        .route("/clients/{id}/prescriptions", get(prescriptions::list_for_client))
        // Examinations
        .route("/prescriptions", post(prescriptions::record))
        .route("/prescriptions/{id}", get(prescriptions::get))
        // Sales
        .route("/sales", get(sales::list).post(sales::create))
        .route("/sales/next-id", get(sales::next_id))
        .route("/sales/{id}", get(sales::get))
        .route("/sales/{id}/amounts", patch(sales::update_amounts))
        .route("/sales/{id}/status", patch(sales::set_status))
        // Notifications
        .route("/notifications", get(notifications::list).delete(notifications::clear))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}", delete(notifications::delete))
        .route("/notifications/{id}/read", patch(notifications::mark_read))
        // Live events
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

// =============================================================================
// Extractors
// =============================================================================

/// Role of the caller, from the `x-actor-role` header.
///
/// Missing header means staff. `system` is reserved for internal moves and
/// is rejected when sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub ActorRole);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor(ActorRole::Staff));
        };
        let value = value
            .to_str()
            .map_err(|_| ApiError::validation(format!("{ACTOR_HEADER} must be ASCII")))?;
        match value.parse::<ActorRole>()? {
            ActorRole::System => Err(ApiError::validation(format!(
                "{ACTOR_HEADER} 'system' is not accepted from clients"
            ))),
            role => Ok(Actor(role)),
        }
    }
}

/// `Json` whose rejection uses the API error body.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// `Query` whose rejection uses the API error body.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}
