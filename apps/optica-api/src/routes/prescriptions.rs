//! Examination handlers.

use axum::extract::{Path, State};
use axum::Json;

use optica_core::NewPrescription;

use super::ApiJson;
use crate::api_types::{PrescriptionBody, PrescriptionList, Success};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /prescriptions`
///
/// Moves a waiting client to `examined`.
pub async fn record(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<NewPrescription>,
) -> Result<Json<Success<PrescriptionBody>>, ApiError> {
    let outcome = state.db.prescriptions().record(form, state.today()).await?;
    let prescription = state.publish(outcome);
    Ok(Json(Success::new(PrescriptionBody { prescription })))
}

/// `GET /prescriptions/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Success<PrescriptionBody>>, ApiError> {
    let prescription = state.db.prescriptions().require(&id).await?;
    Ok(Json(Success::new(PrescriptionBody { prescription })))
}

/// `GET /clients/{id}/prescriptions`, newest exam first.
pub async fn list_for_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Success<PrescriptionList>>, ApiError> {
    state.db.clients().require(&id).await?;
    let prescriptions = state.db.prescriptions().list_for_client(&id).await?;
    Ok(Json(Success::new(PrescriptionList { prescriptions })))
}
