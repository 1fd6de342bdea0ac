use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patient profile row; `user_id` links it to the Supabase Auth account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl CreatePatientRequest {
    /// Split a single "full name" field at the first space: "Ada King Lovelace"
    /// becomes first "Ada", last "King Lovelace".
    pub fn from_full_name(user_id: Uuid, full_name: &str, phone: Option<String>) -> Self {
        let trimmed = full_name.trim();
        let (first_name, last_name) = match trimmed.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (trimmed.to_string(), String::new()),
        };

        Self {
            user_id,
            first_name,
            last_name,
            phone: phone.filter(|p| !p.trim().is_empty()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient data not found")]
    NotFound,
}
