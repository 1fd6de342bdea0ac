// libs/appointment-cell/src/repository.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    Appointment, AppointmentStatus, AtomicBookingOutcome, AvailabilitySlot, BookingError,
    NewAppointment,
};

const SLOTS: &str = "/rest/v1/doctor_availabilities";
const APPOINTMENTS: &str = "/rest/v1/appointments";
const BOOK_RPC: &str = "/rest/v1/rpc/book_appointment_slot";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// The store refused the write because it would break a uniqueness rule,
    /// or a conditional update matched no row.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

impl From<SupabaseError> for RepositoryError {
    fn from(err: SupabaseError) -> Self {
        if err.is_conflict() {
            RepositoryError::Conflict(err.to_string())
        } else {
            RepositoryError::Backend(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Backend(format!("Failed to parse response: {}", err))
    }
}

impl From<RepositoryError> for BookingError {
    fn from(err: RepositoryError) -> Self {
        BookingError::Persistence(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Persistence boundary over the availability slot and appointment collections.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Slot at the exact triple, only if `is_booked = false`.
    async fn find_open_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Option<AvailabilitySlot>>;

    /// Slot at the exact triple regardless of its flag.
    async fn find_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Option<AvailabilitySlot>>;

    /// Every slot for the doctor on that date, ordered by time.
    async fn list_slots(&self, doctor_id: Uuid, date: NaiveDate)
        -> RepositoryResult<Vec<AvailabilitySlot>>;

    async fn active_appointments_at(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Vec<Appointment>>;

    async fn active_appointments_for_patient(&self, patient_id: Uuid, doctor_id: Uuid, date: NaiveDate)
        -> RepositoryResult<Vec<Appointment>>;

    async fn active_appointments_on(&self, doctor_id: Uuid, date: NaiveDate)
        -> RepositoryResult<Vec<Appointment>>;

    async fn insert_appointment(&self, appointment: &NewAppointment) -> RepositoryResult<Appointment>;

    /// Flip the slot flag. Fails with `Conflict` when the slot is not in the
    /// opposite state (somebody else flipped it first).
    async fn set_slot_booked(&self, slot_id: Uuid, is_booked: bool) -> RepositoryResult<()>;

    /// Fails unless the row is actually gone afterwards.
    async fn delete_appointment(&self, appointment_id: Uuid) -> RepositoryResult<()>;

    async fn get_appointment(&self, appointment_id: Uuid) -> RepositoryResult<Option<Appointment>>;

    /// Only touches an appointment that is still active; `Conflict` when it
    /// already moved to a terminal status.
    async fn update_appointment_status(&self, appointment_id: Uuid, status: AppointmentStatus)
        -> RepositoryResult<Appointment>;

    /// A patient's appointments ordered by date, then time.
    async fn list_patient_appointments(&self, patient_id: Uuid) -> RepositoryResult<Vec<Appointment>>;

    /// Run the whole check-then-write sequence in one database transaction.
    async fn book_slot_atomically(&self, appointment: &NewAppointment) -> RepositoryResult<AtomicBookingOutcome>;
}

// ==============================================================================
// SUPABASE IMPLEMENTATION
// ==============================================================================

/// PostgREST-backed repository acting with one caller's access token, so
/// row-level security applies to every query.
pub struct SupabaseBookingRepository {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseBookingRepository {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: impl Into<String>) -> Self {
        Self {
            supabase,
            auth_token: auth_token.into(),
        }
    }

    async fn select<T: DeserializeOwned>(&self, path: String) -> RepositoryResult<Vec<T>> {
        debug!("Selecting {}", path);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        let parsed = rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;
        Ok(parsed)
    }

    /// Write that echoes the affected rows; a 204 with no body reads as none.
    async fn write<T: DeserializeOwned>(&self, method: Method, path: String, body: Option<Value>) -> RepositoryResult<Vec<T>> {
        debug!("Writing {} {}", method, path);
        let rows: Option<Vec<T>> = self.supabase.request_with_headers(
            method,
            &path,
            Some(&self.auth_token),
            body,
            Some(SupabaseClient::return_representation()),
        ).await?;
        Ok(rows.unwrap_or_default())
    }
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn fmt_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

#[async_trait]
impl BookingRepository for SupabaseBookingRepository {
    async fn find_open_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Option<AvailabilitySlot>> {
        let path = format!(
            "{}?doctor_id=eq.{}&available_date=eq.{}&available_time=eq.{}&is_booked=eq.false&limit=1",
            SLOTS, doctor_id, fmt_date(date), fmt_time(time)
        );
        Ok(self.select(path).await?.into_iter().next())
    }

    async fn find_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Option<AvailabilitySlot>> {
        let path = format!(
            "{}?doctor_id=eq.{}&available_date=eq.{}&available_time=eq.{}&limit=1",
            SLOTS, doctor_id, fmt_date(date), fmt_time(time)
        );
        Ok(self.select(path).await?.into_iter().next())
    }

    async fn list_slots(&self, doctor_id: Uuid, date: NaiveDate)
        -> RepositoryResult<Vec<AvailabilitySlot>> {
        let path = format!(
            "{}?doctor_id=eq.{}&available_date=eq.{}&order=available_time.asc",
            SLOTS, doctor_id, fmt_date(date)
        );
        self.select(path).await
    }

    async fn active_appointments_at(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Vec<Appointment>> {
        let path = format!(
            "{}?doctor_id=eq.{}&appointment_date=eq.{}&appointment_time=eq.{}&status={}",
            APPOINTMENTS, doctor_id, fmt_date(date), fmt_time(time), AppointmentStatus::active_filter()
        );
        self.select(path).await
    }

    async fn active_appointments_for_patient(&self, patient_id: Uuid, doctor_id: Uuid, date: NaiveDate)
        -> RepositoryResult<Vec<Appointment>> {
        let path = format!(
            "{}?patient_id=eq.{}&doctor_id=eq.{}&appointment_date=eq.{}&status={}",
            APPOINTMENTS, patient_id, doctor_id, fmt_date(date), AppointmentStatus::active_filter()
        );
        self.select(path).await
    }

    async fn active_appointments_on(&self, doctor_id: Uuid, date: NaiveDate)
        -> RepositoryResult<Vec<Appointment>> {
        let path = format!(
            "{}?doctor_id=eq.{}&appointment_date=eq.{}&status={}",
            APPOINTMENTS, doctor_id, fmt_date(date), AppointmentStatus::active_filter()
        );
        self.select(path).await
    }

    async fn insert_appointment(&self, appointment: &NewAppointment) -> RepositoryResult<Appointment> {
        let body = json!({
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "appointment_date": fmt_date(appointment.appointment_date),
            "appointment_time": fmt_time(appointment.appointment_time),
            "status": appointment.status,
            "created_at": appointment.created_at.to_rfc3339()
        });

        let rows: Vec<Appointment> = self.write(Method::POST, APPOINTMENTS.to_string(), Some(body)).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Backend("Appointment insert returned no row".to_string()))
    }

    async fn set_slot_booked(&self, slot_id: Uuid, is_booked: bool) -> RepositoryResult<()> {
        // Only matches while the slot is still in the opposite state.
        let path = format!("{}?id=eq.{}&is_booked=eq.{}", SLOTS, slot_id, !is_booked);
        let rows: Vec<Value> = self.write(Method::PATCH, path, Some(json!({ "is_booked": is_booked }))).await?;

        if rows.is_empty() {
            return Err(RepositoryError::Conflict(format!(
                "slot {} was not in the expected state", slot_id
            )));
        }
        Ok(())
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> RepositoryResult<()> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, appointment_id);
        let rows: Vec<Value> = self.write(Method::DELETE, path, None).await?;

        // Row-level security turns a refused delete into zero rows, not an error.
        if rows.is_empty() {
            return Err(RepositoryError::Backend(format!(
                "appointment {} was not deleted", appointment_id
            )));
        }
        Ok(())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> RepositoryResult<Option<Appointment>> {
        let path = format!("{}?id=eq.{}&limit=1", APPOINTMENTS, appointment_id);
        Ok(self.select(path).await?.into_iter().next())
    }

    async fn update_appointment_status(&self, appointment_id: Uuid, status: AppointmentStatus)
        -> RepositoryResult<Appointment> {
        let path = format!(
            "{}?id=eq.{}&status={}",
            APPOINTMENTS, appointment_id, AppointmentStatus::active_filter()
        );
        let rows: Vec<Appointment> = self.write(Method::PATCH, path, Some(json!({ "status": status }))).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Conflict(format!(
                "appointment {} is no longer active", appointment_id
            )))
    }

    async fn list_patient_appointments(&self, patient_id: Uuid) -> RepositoryResult<Vec<Appointment>> {
        let path = format!(
            "{}?patient_id=eq.{}&order=appointment_date.asc,appointment_time.asc",
            APPOINTMENTS, patient_id
        );
        self.select(path).await
    }

    async fn book_slot_atomically(&self, appointment: &NewAppointment) -> RepositoryResult<AtomicBookingOutcome> {
        let body = json!({
            "p_patient_id": appointment.patient_id,
            "p_doctor_id": appointment.doctor_id,
            "p_date": fmt_date(appointment.appointment_date),
            "p_time": fmt_time(appointment.appointment_time)
        });

        let outcome: AtomicBookingOutcome = self.supabase.request(
            Method::POST,
            BOOK_RPC,
            Some(&self.auth_token),
            Some(body),
        ).await?;
        Ok(outcome)
    }
}
