use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the booking coordinator moves a slot from free to booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStrategy {
    /// Ordered client-side checks followed by insert + update, with a compensating delete.
    Sequential,
    /// One server-side transaction through the `book_appointment_slot` RPC.
    Atomic,
}

impl FromStr for BookingStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(BookingStrategy::Sequential),
            "atomic" => Ok(BookingStrategy::Atomic),
            other => Err(format!("unknown booking strategy '{}'", other)),
        }
    }
}

impl fmt::Display for BookingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStrategy::Sequential => write!(f, "sequential"),
            BookingStrategy::Atomic => write!(f, "atomic"),
        }
    }
}

/// What happens to the availability slot when its appointment is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotReleasePolicy {
    /// Slot keeps `is_booked = true`; slot reads OR in live appointments.
    Retain,
    /// Slot is flipped back to `is_booked = false`.
    Release,
}

impl FromStr for SlotReleasePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(SlotReleasePolicy::Retain),
            "release" => Ok(SlotReleasePolicy::Release),
            other => Err(format!("unknown slot release policy '{}'", other)),
        }
    }
}

impl fmt::Display for SlotReleasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotReleasePolicy::Retain => write!(f, "retain"),
            SlotReleasePolicy::Release => write!(f, "release"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub booking_strategy: BookingStrategy,
    pub slot_release_policy: SlotReleasePolicy,
    pub clinic_utc_offset_minutes: i32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, registration rollback disabled");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            booking_strategy: parse_env_or("BOOKING_STRATEGY", BookingStrategy::Sequential),
            slot_release_policy: parse_env_or("SLOT_RELEASE_ON_CANCEL", SlotReleasePolicy::Retain),
            clinic_utc_offset_minutes: clinic_offset_or_utc(parse_env_or("CLINIC_UTC_OFFSET_MINUTES", 0)),
            port: parse_env_or("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn can_administer_users(&self) -> bool {
        !self.supabase_service_role_key.is_empty()
    }
}

/// UTC offsets must stay strictly within one day.
const MAX_CLINIC_OFFSET_MINUTES: i32 = 24 * 60 - 1;

fn clinic_offset_or_utc(minutes: i32) -> i32 {
    if minutes.unsigned_abs() > MAX_CLINIC_OFFSET_MINUTES.unsigned_abs() {
        warn!("CLINIC_UTC_OFFSET_MINUTES {} is outside +/-{}, using UTC", minutes, MAX_CLINIC_OFFSET_MINUTES);
        return 0;
    }
    minutes
}

fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("{} has invalid value '{}' ({}), using default {}", key, raw, e, default);
            default
        }),
        Err(_) => default,
    }
}
