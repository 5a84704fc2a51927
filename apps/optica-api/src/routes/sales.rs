//! Sale handlers.
//!
//! `{id}` accepts either the sale uuid or its reference number.

use axum::extract::{Path, State};
use axum::Json;
use tracing::debug;

use optica_core::validation::validate_limit;
use optica_core::{EntityKind, NewSale, RecordStatus, SaleAmountsUpdate, DEFAULT_LIST_LIMIT};

use super::{Actor, ApiJson, ApiQuery};
use crate::api_types::{NextId, SaleBody, SaleList, SaleQuery, StatusChange, Success};
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

/// `GET /sales/next-id`
pub async fn next_id(State(state): State<AppState>) -> ApiResult<NextId> {
    let next = state.db.sequences().peek(EntityKind::Sale, state.today()).await?;
    Ok(Json(Success::new(NextId { next_id: next.value })))
}

/// `GET /sales?status=&client_id=&limit=`
pub async fn list(State(state): State<AppState>, ApiQuery(query): ApiQuery<SaleQuery>) -> ApiResult<SaleList> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<RecordStatus>)
        .transpose()?;
    let limit = validate_limit(query.limit, DEFAULT_LIST_LIMIT)?;

    let sales = state
        .db
        .sales()
        .list(status, query.client_id.as_deref(), limit)
        .await?;
    debug!(status = ?status, results = sales.len(), "Sale list");
    Ok(Json(Success::new(SaleList {
        count: sales.len(),
        sales,
    })))
}

/// `POST /sales`
pub async fn create(State(state): State<AppState>, ApiJson(form): ApiJson<NewSale>) -> ApiResult<SaleBody> {
    let outcome = state.db.sales().create(form, state.today()).await?;
    let sale = state.publish(outcome);
    Ok(Json(Success::new(SaleBody { sale })))
}

/// `GET /sales/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<SaleBody> {
    let sale = state
        .db
        .sales()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &id))?;
    Ok(Json(Success::new(SaleBody { sale })))
}

/// `PATCH /sales/{id}/amounts`
pub async fn update_amounts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<SaleAmountsUpdate>,
) -> ApiResult<SaleBody> {
    let sale = state.db.sales().update_amounts(&id, update).await?;
    Ok(Json(Success::new(SaleBody { sale })))
}

/// `PATCH /sales/{id}/status`
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<SaleBody> {
    let target: RecordStatus = change.status.parse()?;
    let outcome = state.db.sales().set_status(&id, target, actor).await?;
    let sale = state.publish(outcome);
    Ok(Json(Success::new(SaleBody { sale })))
}
