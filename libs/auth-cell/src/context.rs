use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AvailabilitySlot, BookingError};
use appointment_cell::services::BookingCoordinator;
use doctor_cell::models::Doctor;
use doctor_cell::services::DoctorService;
use patient_cell::models::Patient;
use patient_cell::services::PatientService;
use shared_config::AppConfig;

use crate::models::{AuthUser, Session};

#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

/// Everything loaded for one signed-in user.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session: Session,
    pub patient: Option<Patient>,
    pub doctors: Vec<Doctor>,
}

/// What a client sees of the context; the raw tokens stay server side.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub user: AuthUser,
    pub patient: Option<Patient>,
    pub doctors: Vec<Doctor>,
}

/// Per-user application state, populated on sign-in and dropped on sign-out.
pub struct AppContext {
    config: Arc<AppConfig>,
    state: Option<SessionState>,
}

impl AppContext {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config, state: None }
    }

    pub async fn handle_auth_event(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                let state = self.load(session).await;
                self.state = Some(state);
            }
            AuthEvent::SignedOut => {
                if self.state.take().is_some() {
                    info!("Session context cleared");
                }
            }
        }
    }

    async fn load(&self, session: Session) -> SessionState {
        let user_id = session.user.id.to_string();
        let token = session.access_token.as_str();

        let patient = match PatientService::new(&self.config).get_by_user_id(&user_id, token).await {
            Ok(patient) => patient,
            Err(e) => {
                warn!("Failed to load patient profile for user {}: {}", user_id, e);
                None
            }
        };

        let doctors = match DoctorService::new(&self.config).list_doctors(Some(token)).await {
            Ok(doctors) => doctors,
            Err(e) => {
                warn!("Failed to load doctors: {}", e);
                Vec::new()
            }
        };

        debug!("Context loaded for user {}: patient={}, {} doctors",
               user_id, patient.is_some(), doctors.len());

        SessionState { session, patient, doctors }
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn patient(&self) -> Option<&Patient> {
        self.state.as_ref().and_then(|s| s.patient.as_ref())
    }

    pub fn doctors(&self) -> &[Doctor] {
        self.state.as_ref().map(|s| s.doctors.as_slice()).unwrap_or(&[])
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.state.as_ref().map(|s| SessionSnapshot {
            user: s.session.user.clone(),
            patient: s.patient.clone(),
            doctors: s.doctors.clone(),
        })
    }

    fn coordinator(&self) -> Result<BookingCoordinator, BookingError> {
        let state = self.state.as_ref().ok_or(BookingError::NotAuthenticated)?;
        Ok(BookingCoordinator::for_user(&self.config, &state.session.access_token))
    }

    /// Books for the signed-in patient; without one nothing is sent to the store.
    pub async fn book_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Appointment, BookingError> {
        let patient_id = self.patient().map(|p| p.id).ok_or(BookingError::NotAuthenticated)?;
        self.coordinator()?
            .book_appointment(patient_id, doctor_id, date, time)
            .await
    }

    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.coordinator()?.cancel_appointment(appointment_id).await
    }

    pub async fn fetch_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, BookingError> {
        self.coordinator()?.fetch_available_slots(doctor_id, date).await
    }
}
