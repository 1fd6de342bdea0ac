// libs/appointment-cell/src/models.rs
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

/// One bookable (doctor, date, time) unit, row of `doctor_availabilities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub available_date: NaiveDate,
    pub available_time: NaiveTime,
    pub is_booked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn occupies(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime) -> bool {
        self.doctor_id == doctor_id && self.appointment_date == date && self.appointment_time == time
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[serde(alias = "pending")]
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Statuses that hold a slot.
    pub const ACTIVE: [AppointmentStatus; 2] = [AppointmentStatus::Scheduled, AppointmentStatus::Confirmed];

    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    /// PostgREST `in.(...)` filter value for active statuses.
    pub fn active_filter() -> String {
        let names: Vec<String> = Self::ACTIVE.iter().map(|s| s.to_string()).collect();
        format!("in.({})", names.join(","))
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Row to insert when a booking passes every check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl NewAppointment {
    pub fn scheduled(patient_id: Uuid, doctor_id: Uuid, date: NaiveDate, time: NaiveTime, now: DateTime<Utc>) -> Self {
        Self {
            patient_id,
            doctor_id,
            appointment_date: date,
            appointment_time: time,
            status: AppointmentStatus::Scheduled,
            created_at: now,
        }
    }
}

/// Result reported by the `book_appointment_slot` database function.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AtomicBookingOutcome {
    Booked { appointment: Appointment },
    SlotUnavailable,
    SlotAlreadyBooked,
    DuplicateBooking,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Booking request as sent by the client; date and time arrive as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub doctor_id: String,
    pub date: String,
}

/// `{ success, error }` shape returned by state-changing operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub appointment: Option<Appointment>,
}

impl ActionResponse {
    pub fn ok(appointment: Appointment) -> Self {
        Self {
            success: true,
            error: None,
            error_kind: None,
            appointment: Some(appointment),
        }
    }

    pub fn failed(error: &BookingError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            appointment: None,
        }
    }
}

/// `{ data, error }` shape returned by read operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { data, error: None, error_kind: None }
    }
}

impl<T: Default> DataResponse<T> {
    pub fn failed(error: &BookingError) -> Self {
        Self {
            data: T::default(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        }
    }
}

// ==============================================================================
// INPUT PARSING
// ==============================================================================

pub fn parse_booking_date(raw: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::Validation(format!("'{}' is not a YYYY-MM-DD date", raw)))
}

/// Accepts `HH:MM` and `HH:MM:SS`; both name the same slot.
pub fn parse_booking_time(raw: &str) -> Result<NaiveTime, BookingError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| BookingError::Validation(format!("'{}' is not an HH:MM time", raw)))
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("Cannot book appointments in the past")]
    PastDate,

    #[error("This time slot is not available")]
    SlotUnavailable,

    #[error("This time slot is already booked")]
    SlotAlreadyBooked,

    #[error("You already have an appointment with this doctor on this date")]
    DuplicateBooking,

    #[error("Failed to update doctor availability. Please try again.")]
    AvailabilityUpdate,

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment cannot be cancelled in its current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Persistence(String),
}

impl BookingError {
    /// Stable machine-readable name for the client.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::PastDate => "past_date",
            BookingError::SlotUnavailable => "slot_unavailable",
            BookingError::SlotAlreadyBooked => "slot_already_booked",
            BookingError::DuplicateBooking => "duplicate_booking",
            BookingError::AvailabilityUpdate => "availability_update",
            BookingError::NotAuthenticated => "not_authenticated",
            BookingError::NotFound => "not_found",
            BookingError::InvalidStatusTransition(_) => "invalid_status_transition",
            BookingError::Validation(_) => "validation",
            BookingError::Persistence(_) => "persistence",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::PastDate | BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::SlotUnavailable
            | BookingError::SlotAlreadyBooked
            | BookingError::DuplicateBooking
            | BookingError::InvalidStatusTransition(_) => StatusCode::CONFLICT,
            BookingError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            BookingError::NotFound => StatusCode::NOT_FOUND,
            BookingError::AvailabilityUpdate | BookingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
