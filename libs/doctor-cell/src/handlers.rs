use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{DoctorError, DoctorFilters};
use crate::services::DoctorService;

fn map_doctor_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<DoctorError>() {
        Some(DoctorError::NotFound) => AppError::NotFound(DoctorError::NotFound.to_string()),
        Some(err @ DoctorError::ValidationError(_)) => AppError::BadRequest(err.to_string()),
        None => AppError::Database(e.to_string()),
    }
}

pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(filters): Query<DoctorFilters>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctors = if filters.is_empty() {
        service.list_doctors(None).await
    } else {
        service.filter_doctors(&filters, None).await
    }
    .map_err(map_doctor_error)?;

    Ok(Json(json!({ "data": doctors, "error": null })))
}

pub async fn get_filter_options(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let options = service.filter_options(None).await.map_err(map_doctor_error)?;

    Ok(Json(json!({ "data": options, "error": null })))
}

pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = Uuid::parse_str(&doctor_id)
        .map_err(|_| map_doctor_error(DoctorError::ValidationError("invalid doctor id".to_string()).into()))?;

    let service = DoctorService::new(&state);
    let doctor = service.get_doctor(doctor_id, None).await.map_err(map_doctor_error)?;

    Ok(Json(json!({ "data": doctor, "error": null })))
}
