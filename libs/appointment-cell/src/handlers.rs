// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::warn;
use uuid::Uuid;

use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{
    parse_booking_date, parse_booking_time, ActionResponse, Appointment, AvailabilitySlot,
    BookAppointmentRequest, BookingError, DataResponse, SlotsQuery,
};
use crate::services::BookingCoordinator;

type ActionReply = (StatusCode, Json<ActionResponse>);
type DataReply<T> = (StatusCode, Json<DataResponse<T>>);

fn action_failed(error: BookingError) -> ActionReply {
    (error.status_code(), Json(ActionResponse::failed(&error)))
}

fn data_failed<T: Default>(error: BookingError) -> DataReply<T> {
    (error.status_code(), Json(DataResponse::failed(&error)))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, BookingError> {
    Uuid::parse_str(raw.trim()).map_err(|_| BookingError::Validation(format!("invalid {} id", what)))
}

/// Patient row id of the caller. Accounts without a patient profile are
/// treated as not signed in.
async fn resolve_patient_id(config: &AppConfig, user: &User, token: &str) -> Result<Uuid, BookingError> {
    match PatientService::new(config).get_by_user_id(&user.id, token).await {
        Ok(Some(patient)) => Ok(patient.id),
        Ok(None) => {
            warn!("No patient profile for user {}", user.id);
            Err(BookingError::NotAuthenticated)
        }
        Err(e) => Err(BookingError::Persistence(e.to_string())),
    }
}

/// Appointment owned by `patient_id`; other patients' records read as missing.
async fn owned_appointment(
    coordinator: &BookingCoordinator,
    appointment_id: Uuid,
    patient_id: Uuid,
) -> Result<Appointment, BookingError> {
    let appointment = coordinator.get_appointment(appointment_id).await?;
    if appointment.patient_id != patient_id {
        warn!("Patient {} asked for appointment {} owned by someone else", patient_id, appointment_id);
        return Err(BookingError::NotFound);
    }
    Ok(appointment)
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> ActionReply {
    let token = auth.token();

    let outcome = async {
        let patient_id = resolve_patient_id(&config, &user, token).await?;
        let date = parse_booking_date(&request.date)?;
        let time = parse_booking_time(&request.time)?;

        BookingCoordinator::for_user(&config, token)
            .book_appointment(patient_id, request.doctor_id, date, time)
            .await
    }.await;

    match outcome {
        Ok(appointment) => (StatusCode::CREATED, Json(ActionResponse::ok(appointment))),
        Err(e) => action_failed(e),
    }
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> ActionReply {
    let token = auth.token();

    let outcome = async {
        let appointment_id = parse_id(&appointment_id, "appointment")?;
        let patient_id = resolve_patient_id(&config, &user, token).await?;

        let coordinator = BookingCoordinator::for_user(&config, token);
        owned_appointment(&coordinator, appointment_id, patient_id).await?;
        coordinator.cancel_appointment(appointment_id).await
    }.await;

    match outcome {
        Ok(appointment) => (StatusCode::OK, Json(ActionResponse::ok(appointment))),
        Err(e) => action_failed(e),
    }
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotsQuery>,
) -> DataReply<Vec<AvailabilitySlot>> {
    let outcome = async {
        let doctor_id = parse_id(&query.doctor_id, "doctor")?;
        let date = parse_booking_date(&query.date)?;

        BookingCoordinator::for_user(&config, auth.token())
            .fetch_available_slots(doctor_id, date)
            .await
    }.await;

    match outcome {
        Ok(slots) => (StatusCode::OK, Json(DataResponse::ok(slots))),
        Err(e) => data_failed(e),
    }
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> DataReply<Vec<Appointment>> {
    let token = auth.token();

    let outcome = async {
        let patient_id = resolve_patient_id(&config, &user, token).await?;
        BookingCoordinator::for_user(&config, token)
            .list_patient_appointments(patient_id)
            .await
    }.await;

    match outcome {
        Ok(appointments) => (StatusCode::OK, Json(DataResponse::ok(appointments))),
        Err(e) => data_failed(e),
    }
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> DataReply<Option<Appointment>> {
    let token = auth.token();

    let outcome = async {
        let appointment_id = parse_id(&appointment_id, "appointment")?;
        let patient_id = resolve_patient_id(&config, &user, token).await?;

        let coordinator = BookingCoordinator::for_user(&config, token);
        owned_appointment(&coordinator, appointment_id, patient_id).await
    }.await;

    match outcome {
        Ok(appointment) => (StatusCode::OK, Json(DataResponse::ok(Some(appointment)))),
        Err(e) => data_failed(e),
    }
}
