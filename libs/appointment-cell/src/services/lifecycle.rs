// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentStatus, BookingError};

/// Appointment status state machine:
/// `scheduled -> confirmed -> completed`, and `scheduled|confirmed -> cancelled`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(BookingError::InvalidStatusTransition(current_status));
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_cancel_transitions_are_allowed() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Confirmed).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Completed).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Cancelled).is_ok());
    }

    #[test]
    fn no_skipping_or_leaving_terminal_states() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_eq!(
            lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Completed),
            Err(BookingError::InvalidStatusTransition(AppointmentStatus::Scheduled))
        );
        assert_eq!(
            lifecycle.validate_status_transition(AppointmentStatus::Cancelled, AppointmentStatus::Cancelled),
            Err(BookingError::InvalidStatusTransition(AppointmentStatus::Cancelled))
        );
        assert!(lifecycle.get_valid_transitions(AppointmentStatus::Completed).is_empty());
    }
}
