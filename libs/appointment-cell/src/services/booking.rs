// libs/appointment-cell/src/services/booking.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_config::{AppConfig, BookingStrategy, SlotReleasePolicy};
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, AtomicBookingOutcome, AvailabilitySlot, BookingError,
    NewAppointment,
};
use crate::repository::{BookingRepository, SupabaseBookingRepository};
use crate::services::lifecycle::AppointmentLifecycleService;

#[derive(Debug, Clone, Copy)]
pub struct BookingSettings {
    pub strategy: BookingStrategy,
    pub release_policy: SlotReleasePolicy,
    /// Offset of the clinic wall clock that slot dates and times are written in.
    pub clinic_offset: FixedOffset,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            strategy: BookingStrategy::Sequential,
            release_policy: SlotReleasePolicy::Retain,
            clinic_offset: Utc.fix(),
        }
    }
}

impl BookingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let clinic_offset = config.clinic_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!("CLINIC_UTC_OFFSET_MINUTES {} out of range, using UTC", config.clinic_utc_offset_minutes);
                Utc.fix()
            });

        Self {
            strategy: config.booking_strategy,
            release_policy: config.slot_release_policy,
            clinic_offset,
        }
    }
}

/// Moves one slot from free to booked while creating its appointment, or
/// reverses a booking. Holds no state between calls.
pub struct BookingCoordinator {
    repository: Arc<dyn BookingRepository>,
    lifecycle: AppointmentLifecycleService,
    settings: BookingSettings,
}

impl BookingCoordinator {
    pub fn new(repository: Arc<dyn BookingRepository>, settings: BookingSettings) -> Self {
        Self {
            repository,
            lifecycle: AppointmentLifecycleService::new(),
            settings,
        }
    }

    /// Coordinator talking to Supabase on behalf of the token's owner.
    pub fn for_user(config: &AppConfig, auth_token: &str) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let repository = Arc::new(SupabaseBookingRepository::new(supabase, auth_token));
        Self::new(repository, BookingSettings::from_config(config))
    }

    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Appointment, BookingError> {
        self.book_appointment_at(patient_id, doctor_id, date, time, Utc::now()).await
    }

    /// Book with an explicit "now"; the slot must start strictly after it.
    #[instrument(skip(self), fields(strategy = %self.settings.strategy))]
    pub async fn book_appointment_at(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingError> {
        info!("Booking appointment for patient {} with doctor {} at {} {}",
              patient_id, doctor_id, date, time);

        if !self.starts_after(date, time, now) {
            warn!("Rejected booking in the past: {} {} (now {})", date, time, now);
            return Err(BookingError::PastDate);
        }

        let new_appointment = NewAppointment::scheduled(patient_id, doctor_id, date, time, now);
        let result = match self.settings.strategy {
            BookingStrategy::Sequential => self.book_sequential(&new_appointment).await,
            BookingStrategy::Atomic => self.book_atomic(&new_appointment).await,
        };

        match &result {
            Ok(appointment) => info!("Appointment {} booked for patient {}", appointment.id, patient_id),
            Err(e) => warn!("Booking for patient {} failed: {}", patient_id, e),
        }
        result
    }

    fn starts_after(&self, date: NaiveDate, time: NaiveTime, now: DateTime<Utc>) -> bool {
        let wall_clock = date.and_time(time);
        match self.settings.clinic_offset.from_local_datetime(&wall_clock).single() {
            Some(start) => start.with_timezone(&Utc) > now,
            None => false,
        }
    }

    async fn book_sequential(&self, new_appointment: &NewAppointment) -> Result<Appointment, BookingError> {
        let NewAppointment { patient_id, doctor_id, appointment_date: date, appointment_time: time, .. } = *new_appointment;

        let slot = match self.repository.find_open_slot(doctor_id, date, time).await? {
            Some(slot) => slot,
            None => return Err(self.classify_closed_slot(doctor_id, date, time).await?),
        };
        debug!("Open slot {} found", slot.id);

        // Another patient may have booked between the slot read and now.
        let taken = self.repository.active_appointments_at(doctor_id, date, time).await?;
        if !taken.is_empty() {
            return Err(BookingError::SlotAlreadyBooked);
        }

        let same_day = self.repository.active_appointments_for_patient(patient_id, doctor_id, date).await?;
        if !same_day.is_empty() {
            return Err(BookingError::DuplicateBooking);
        }

        let appointment = self.repository
            .insert_appointment(new_appointment)
            .await
            .map_err(|e| if e.is_conflict() {
                BookingError::SlotAlreadyBooked
            } else {
                e.into()
            })?;
        debug!("Appointment {} inserted, marking slot {} booked", appointment.id, slot.id);

        if let Err(update_err) = self.repository.set_slot_booked(slot.id, true).await {
            error!("Failed to mark slot {} booked: {}", slot.id, update_err);
            self.compensate(&appointment).await;
            return Err(BookingError::AvailabilityUpdate);
        }

        Ok(appointment)
    }

    /// A slot that is not open is "already booked" when an active appointment
    /// holds it, otherwise simply unavailable.
    async fn classify_closed_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<BookingError, BookingError> {
        let holders = self.repository.active_appointments_at(doctor_id, date, time).await?;
        Ok(if holders.is_empty() {
            BookingError::SlotUnavailable
        } else {
            BookingError::SlotAlreadyBooked
        })
    }

    /// Best-effort rollback of an inserted appointment. A failure here is only
    /// logged; the caller still sees the availability error.
    async fn compensate(&self, appointment: &Appointment) {
        match self.repository.delete_appointment(appointment.id).await {
            Ok(()) => info!("Rolled back appointment {}", appointment.id),
            Err(e) => error!(
                "Compensating delete of appointment {} failed, record left without a booked slot: {}",
                appointment.id, e
            ),
        }
    }

    async fn book_atomic(&self, new_appointment: &NewAppointment) -> Result<Appointment, BookingError> {
        match self.repository.book_slot_atomically(new_appointment).await {
            Ok(AtomicBookingOutcome::Booked { appointment }) => Ok(appointment),
            Ok(AtomicBookingOutcome::SlotUnavailable) => Err(BookingError::SlotUnavailable),
            Ok(AtomicBookingOutcome::SlotAlreadyBooked) => Err(BookingError::SlotAlreadyBooked),
            Ok(AtomicBookingOutcome::DuplicateBooking) => Err(BookingError::DuplicateBooking),
            Err(e) if e.is_conflict() => Err(BookingError::SlotAlreadyBooked),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let current = self.get_appointment(appointment_id).await?;
        self.lifecycle.validate_status_transition(current.status, AppointmentStatus::Cancelled)?;

        let cancelled = match self.repository
            .update_appointment_status(appointment_id, AppointmentStatus::Cancelled)
            .await
        {
            Ok(appointment) => appointment,
            Err(e) if e.is_conflict() => {
                // Someone else moved it on between our read and the update.
                let status = match self.repository.get_appointment(appointment_id).await {
                    Ok(Some(latest)) => latest.status,
                    _ => current.status,
                };
                warn!("Appointment {} changed to {} before it could be cancelled", appointment_id, status);
                return Err(BookingError::InvalidStatusTransition(status));
            }
            Err(e) => return Err(e.into()),
        };

        if self.settings.release_policy == SlotReleasePolicy::Release {
            self.release_slot(&cancelled).await;
        }

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    async fn release_slot(&self, appointment: &Appointment) {
        let (doctor_id, date, time) = (appointment.doctor_id, appointment.appointment_date, appointment.appointment_time);

        let slot = match self.repository.find_slot(doctor_id, date, time).await {
            Ok(Some(slot)) if slot.is_booked => slot,
            Ok(_) => {
                debug!("No booked slot to release for appointment {}", appointment.id);
                return;
            }
            Err(e) => {
                warn!("Could not look up slot for appointment {}: {}", appointment.id, e);
                return;
            }
        };

        match self.repository.active_appointments_at(doctor_id, date, time).await {
            Ok(remaining) if remaining.is_empty() => {}
            Ok(_) => {
                warn!("Slot {} still held by another active appointment, keeping it booked", slot.id);
                return;
            }
            Err(e) => {
                warn!("Could not verify slot {} before release: {}", slot.id, e);
                return;
            }
        }

        match self.repository.set_slot_booked(slot.id, false).await {
            Ok(()) => info!("Released slot {}", slot.id),
            Err(e) if e.is_conflict() => debug!("Slot {} was already free", slot.id),
            Err(e) => warn!("Failed to release slot {}: {}", slot.id, e),
        }
    }

    /// Slots for the doctor on `date`; a slot counts as booked when its own
    /// flag says so or an active appointment sits at its time.
    #[instrument(skip(self))]
    pub async fn fetch_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, BookingError> {
        let mut slots = self.repository.list_slots(doctor_id, date).await?;
        let appointments = self.repository.active_appointments_on(doctor_id, date).await?;

        let booked_times: HashSet<NaiveTime> = appointments.iter()
            .filter(|apt| apt.is_active())
            .map(|apt| apt.appointment_time)
            .collect();

        for slot in &mut slots {
            slot.is_booked = slot.is_booked || booked_times.contains(&slot.available_time);
        }
        slots.sort_by_key(|slot| slot.available_time);

        debug!("{} slots for doctor {} on {}", slots.len(), doctor_id, date);
        Ok(slots)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.repository
            .get_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound)
    }

    pub async fn list_patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, BookingError> {
        let mut appointments = self.repository.list_patient_appointments(patient_id).await?;
        appointments.sort_by_key(|apt| (apt.appointment_date, apt.appointment_time));
        Ok(appointments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_offset(minutes: i32) -> AppConfig {
        AppConfig {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            booking_strategy: BookingStrategy::Atomic,
            slot_release_policy: SlotReleasePolicy::Release,
            clinic_utc_offset_minutes: minutes,
            port: 0,
        }
    }

    #[test]
    fn settings_take_the_configured_offset() {
        let settings = BookingSettings::from_config(&config_with_offset(-180));
        assert_eq!(settings.clinic_offset.local_minus_utc(), -180 * 60);
        assert_eq!(settings.strategy, BookingStrategy::Atomic);
        assert_eq!(settings.release_policy, SlotReleasePolicy::Release);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        for minutes in [1440, -1440, 40_000_000, i32::MAX, i32::MIN] {
            let settings = BookingSettings::from_config(&config_with_offset(minutes));
            assert_eq!(settings.clinic_offset.local_minus_utc(), 0, "offset {}", minutes);
        }
    }
}
