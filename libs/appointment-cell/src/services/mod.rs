pub mod booking;
pub mod lifecycle;

pub use booking::{BookingCoordinator, BookingSettings};
pub use lifecycle::AppointmentLifecycleService;
