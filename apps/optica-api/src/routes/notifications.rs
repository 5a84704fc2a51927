//! Notification handlers.

use axum::extract::{Path, State};
use axum::Json;

use optica_core::validation::validate_limit;
use optica_core::DEFAULT_LIST_LIMIT;

use super::ApiQuery;
use crate::api_types::{Affected, NotificationList, NotificationQuery, Success, UnreadCount};
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

/// `GET /notifications?unread=&limit=`
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> ApiResult<NotificationList> {
    let limit = validate_limit(query.limit, DEFAULT_LIST_LIMIT)?;
    let notifications = state.db.notifications().list(query.unread, limit).await?;
    Ok(Json(Success::new(NotificationList { notifications })))
}

/// `GET /notifications/unread-count`
pub async fn unread_count(State(state): State<AppState>) -> ApiResult<UnreadCount> {
    let count = state.db.notifications().unread_count().await?;
    Ok(Json(Success::new(UnreadCount { count })))
}

/// `PATCH /notifications/{id}/read`
pub async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Affected> {
    if !state.db.notifications().mark_read(&id).await? {
        return Err(ApiError::not_found("Notification", &id));
    }
    Ok(Json(Success::new(Affected { updated: 1 })))
}

/// `POST /notifications/read-all`
pub async fn mark_all_read(State(state): State<AppState>) -> ApiResult<Affected> {
    let updated = state.db.notifications().mark_all_read().await?;
    Ok(Json(Success::new(Affected { updated })))
}

/// `DELETE /notifications/{id}`
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Affected> {
    if !state.db.notifications().delete(&id).await? {
        return Err(ApiError::not_found("Notification", &id));
    }
    Ok(Json(Success::new(Affected { updated: 1 })))
}

/// `DELETE /notifications`
pub async fn clear(State(state): State<AppState>) -> ApiResult<Affected> {
    let updated = state.db.notifications().clear().await?;
    Ok(Json(Success::new(Affected { updated })))
}
