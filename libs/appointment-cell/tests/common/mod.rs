// In-memory booking store with switchable failures.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentStatus, AtomicBookingOutcome, AvailabilitySlot, NewAppointment,
};
use appointment_cell::repository::{BookingRepository, RepositoryError, RepositoryResult};
use appointment_cell::services::{BookingCoordinator, BookingSettings};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn coordinator(repo: &Arc<InMemoryBookingRepository>, settings: BookingSettings) -> BookingCoordinator {
    BookingCoordinator::new(repo.clone(), settings)
}

#[derive(Default)]
struct Store {
    slots: Vec<AvailabilitySlot>,
    appointments: Vec<Appointment>,
    calls: Vec<&'static str>,
    fail_reads: bool,
    fail_slot_updates: bool,
    fail_deletes: bool,
    conflict_on_insert: bool,
    /// Mirrors the partial unique index on active appointments.
    unique_active: bool,
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    store: Mutex<Store>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    pub fn add_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime, is_booked: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().slots.push(AvailabilitySlot {
            id,
            doctor_id,
            available_date: date,
            available_time: time,
            is_booked,
        });
        id
    }

    /// Insert an appointment directly, leaving slot flags untouched.
    pub fn add_appointment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        status: AppointmentStatus,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().appointments.push(Appointment {
            id,
            patient_id,
            doctor_id,
            appointment_date: date,
            appointment_time: time,
            status,
            created_at: now(),
        });
        id
    }

    pub fn fail_reads(&self) {
        self.lock().fail_reads = true;
    }

    pub fn fail_slot_updates(&self) {
        self.lock().fail_slot_updates = true;
    }

    pub fn fail_deletes(&self) {
        self.lock().fail_deletes = true;
    }

    /// Every insert fails as if a concurrent booking won the unique index.
    pub fn conflict_on_insert(&self) {
        self.lock().conflict_on_insert = true;
    }

    pub fn enforce_unique_active(&self) {
        self.lock().unique_active = true;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.lock().appointments.clone()
    }

    pub fn slot(&self, slot_id: Uuid) -> AvailabilitySlot {
        self.lock().slots.iter().find(|s| s.id == slot_id).cloned().unwrap()
    }

    pub fn active_at(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime) -> usize {
        self.lock().appointments.iter()
            .filter(|a| a.is_active() && a.occupies(doctor_id, date, time))
            .count()
    }

    fn record(&self, call: &'static str) -> RepositoryResult<MutexGuard<'_, Store>> {
        let mut store = self.lock();
        store.calls.push(call);
        if store.fail_reads && !matches!(call, "insert_appointment" | "set_slot_booked" | "delete_appointment") {
            return Err(RepositoryError::Backend(format!("{} failed", call)));
        }
        Ok(store)
    }
}

fn insert(store: &mut Store, new_appointment: &NewAppointment) -> RepositoryResult<Appointment> {
    if store.conflict_on_insert {
        return Err(RepositoryError::Conflict("duplicate key value violates unique constraint".to_string()));
    }
    if store.unique_active && store.appointments.iter().any(|a| {
        a.is_active() && a.occupies(new_appointment.doctor_id, new_appointment.appointment_date, new_appointment.appointment_time)
    }) {
        return Err(RepositoryError::Conflict("duplicate key value violates unique constraint".to_string()));
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: new_appointment.patient_id,
        doctor_id: new_appointment.doctor_id,
        appointment_date: new_appointment.appointment_date,
        appointment_time: new_appointment.appointment_time,
        status: new_appointment.status,
        created_at: new_appointment.created_at,
    };
    store.appointments.push(appointment.clone());
    Ok(appointment)
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_open_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Option<AvailabilitySlot>> {
        let store = self.record("find_open_slot")?;
        Ok(store.slots.iter()
            .find(|s| s.doctor_id == doctor_id && s.available_date == date && s.available_time == time && !s.is_booked)
            .cloned())
    }

    async fn find_slot(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Option<AvailabilitySlot>> {
        let store = self.record("find_slot")?;
        Ok(store.slots.iter()
            .find(|s| s.doctor_id == doctor_id && s.available_date == date && s.available_time == time)
            .cloned())
    }

    async fn list_slots(&self, doctor_id: Uuid, date: NaiveDate) -> RepositoryResult<Vec<AvailabilitySlot>> {
        let store = self.record("list_slots")?;
        Ok(store.slots.iter()
            .filter(|s| s.doctor_id == doctor_id && s.available_date == date)
            .cloned()
            .collect())
    }

    async fn active_appointments_at(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime)
        -> RepositoryResult<Vec<Appointment>> {
        let store = self.record("active_appointments_at")?;
        Ok(store.appointments.iter()
            .filter(|a| a.is_active() && a.occupies(doctor_id, date, time))
            .cloned()
            .collect())
    }

    async fn active_appointments_for_patient(&self, patient_id: Uuid, doctor_id: Uuid, date: NaiveDate)
        -> RepositoryResult<Vec<Appointment>> {
        let store = self.record("active_appointments_for_patient")?;
        Ok(store.appointments.iter()
            .filter(|a| a.is_active() && a.patient_id == patient_id && a.doctor_id == doctor_id && a.appointment_date == date)
            .cloned()
            .collect())
    }

    async fn active_appointments_on(&self, doctor_id: Uuid, date: NaiveDate) -> RepositoryResult<Vec<Appointment>> {
        let store = self.record("active_appointments_on")?;
        Ok(store.appointments.iter()
            .filter(|a| a.is_active() && a.doctor_id == doctor_id && a.appointment_date == date)
            .cloned()
            .collect())
    }

    async fn insert_appointment(&self, appointment: &NewAppointment) -> RepositoryResult<Appointment> {
        let mut store = self.record("insert_appointment")?;
        insert(&mut store, appointment)
    }

    async fn set_slot_booked(&self, slot_id: Uuid, is_booked: bool) -> RepositoryResult<()> {
        let mut store = self.record("set_slot_booked")?;
        if store.fail_slot_updates {
            return Err(RepositoryError::Backend("availability update rejected".to_string()));
        }
        match store.slots.iter_mut().find(|s| s.id == slot_id && s.is_booked != is_booked) {
            Some(slot) => {
                slot.is_booked = is_booked;
                Ok(())
            }
            None => Err(RepositoryError::Conflict(format!("slot {} not in expected state", slot_id))),
        }
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> RepositoryResult<()> {
        let mut store = self.record("delete_appointment")?;
        if store.fail_deletes {
            return Err(RepositoryError::Backend("delete rejected".to_string()));
        }
        let before = store.appointments.len();
        store.appointments.retain(|a| a.id != appointment_id);
        if store.appointments.len() == before {
            return Err(RepositoryError::Backend(format!("appointment {} was not deleted", appointment_id)));
        }
        Ok(())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> RepositoryResult<Option<Appointment>> {
        let store = self.record("get_appointment")?;
        Ok(store.appointments.iter().find(|a| a.id == appointment_id).cloned())
    }

    async fn update_appointment_status(&self, appointment_id: Uuid, status: AppointmentStatus)
        -> RepositoryResult<Appointment> {
        let mut store = self.record("update_appointment_status")?;
        let appointment = store.appointments.iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| RepositoryError::Backend("no row updated".to_string()))?;
        if !appointment.is_active() {
            return Err(RepositoryError::Conflict(format!("appointment {} is no longer active", appointment_id)));
        }
        appointment.status = status;
        Ok(appointment.clone())
    }

    async fn list_patient_appointments(&self, patient_id: Uuid) -> RepositoryResult<Vec<Appointment>> {
        let store = self.record("list_patient_appointments")?;
        Ok(store.appointments.iter().filter(|a| a.patient_id == patient_id).cloned().collect())
    }

    async fn book_slot_atomically(&self, new_appointment: &NewAppointment) -> RepositoryResult<AtomicBookingOutcome> {
        let mut store = self.record("book_slot_atomically")?;
        let (doctor_id, date, time) = (new_appointment.doctor_id, new_appointment.appointment_date, new_appointment.appointment_time);

        let taken = store.appointments.iter().any(|a| a.is_active() && a.occupies(doctor_id, date, time));
        let slot_index = store.slots.iter()
            .position(|s| s.doctor_id == doctor_id && s.available_date == date && s.available_time == time);

        let slot_index = match slot_index {
            Some(index) if !store.slots[index].is_booked && !taken => index,
            _ if taken => return Ok(AtomicBookingOutcome::SlotAlreadyBooked),
            _ => return Ok(AtomicBookingOutcome::SlotUnavailable),
        };

        let duplicate = store.appointments.iter().any(|a| {
            a.is_active() && a.patient_id == new_appointment.patient_id && a.doctor_id == doctor_id && a.appointment_date == date
        });
        if duplicate {
            return Ok(AtomicBookingOutcome::DuplicateBooking);
        }

        let appointment = insert(&mut store, new_appointment)?;
        store.slots[slot_index].is_booked = true;
        Ok(AtomicBookingOutcome::Booked { appointment })
    }
}
