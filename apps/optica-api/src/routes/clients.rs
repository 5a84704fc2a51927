//! Client handlers.

use axum::extract::{Path, State};
use axum::Json;
use std::time::Instant;
use tracing::{debug, info};

use optica_core::validation::validate_limit;
use optica_core::{ClientDetail, ClientUpdate, EntityKind, NewClient, RecordStatus, DEFAULT_LIST_LIMIT};

use super::{Actor, ApiJson, ApiQuery};
use crate::api_types::{BulkDelete, ClientBody, ClientList, ClientQuery, Deleted, NextId, StatusChange, Success};
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

/// `GET /clients/next-id`
pub async fn next_id(State(state): State<AppState>) -> ApiResult<NextId> {
    let next = state.db.sequences().peek(EntityKind::Client, state.today()).await?;
    Ok(Json(Success::new(NextId { next_id: next.value })))
}

/// `GET /clients?search=&limit=`
pub async fn list(State(state): State<AppState>, ApiQuery(query): ApiQuery<ClientQuery>) -> ApiResult<ClientList> {
    let start = Instant::now();
    let limit = validate_limit(query.limit, DEFAULT_LIST_LIMIT)?;
    let clients = state.db.clients().list(query.search.as_deref(), limit).await?;

    debug!(
        search = ?query.search,
        results = clients.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Client search"
    );
    Ok(Json(Success::new(ClientList {
        count: clients.len(),
        clients,
    })))
}

/// `POST /clients`
pub async fn register(State(state): State<AppState>, ApiJson(form): ApiJson<NewClient>) -> ApiResult<ClientBody> {
    let outcome = state.db.clients().register(form, state.today()).await?;
    let client = state.publish(outcome);
    Ok(Json(Success::new(ClientBody { client })))
}

/// `GET /clients/{id}`
pub async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ClientDetail> {
    let detail = state
        .db
        .clients()
        .detail(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client", &id))?;
    Ok(Json(Success::new(detail)))
}

/// `PUT /clients/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ClientUpdate>,
) -> ApiResult<ClientBody> {
    let client = state.db.clients().update(&id, update).await?;
    Ok(Json(Success::new(ClientBody { client })))
}

/// `PATCH /clients/{id}/status`
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<ClientBody> {
    let target: RecordStatus = change.status.parse()?;
    let outcome = state.db.clients().set_status(&id, target, actor).await?;
    let client = state.publish(outcome);
    Ok(Json(Success::new(ClientBody { client })))
}

/// `POST /clients/bulk-delete`
pub async fn bulk_delete(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(body): ApiJson<BulkDelete>,
) -> ApiResult<Deleted> {
    let outcome = state.db.clients().bulk_delete(&body.ids, actor).await?;
    let deleted = state.publish(outcome);

    info!(requested = body.ids.len(), deleted = deleted.len(), actor = %actor, "Bulk delete");
    Ok(Json(Success::new(Deleted {
        count: deleted.len(),
        deleted,
    })))
}
