use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    pub profile_image_url: Option<String>,
    pub city: String,
    pub address: Option<String>,
    pub consultation_fee: Option<f64>,
    pub description: Option<String>,
    pub experience_years: Option<i32>,
    pub rating: Option<f32>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorFilters {
    pub specialty: Option<String>,
    pub city: Option<String>,
}

impl DoctorFilters {
    pub fn is_empty(&self) -> bool {
        self.specialty.as_deref().map_or(true, str::is_empty)
            && self.city.as_deref().map_or(true, str::is_empty)
    }
}

/// Distinct values the client offers as filter choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub specialties: Vec<String>,
    pub cities: Vec<String>,
}

impl FilterOptions {
    pub fn from_doctors(doctors: &[Doctor]) -> Self {
        let mut specialties: Vec<String> = doctors.iter().map(|d| d.specialty.clone()).collect();
        let mut cities: Vec<String> = doctors.iter().map(|d| d.city.clone()).collect();
        specialties.sort();
        specialties.dedup();
        cities.sort();
        cities.dedup();

        Self { specialties, cities }
    }
}

#[derive(Debug)]
pub enum DoctorError {
    NotFound,
    ValidationError(String),
}

impl std::fmt::Display for DoctorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoctorError::NotFound => write!(f, "Doctor not found"),
            DoctorError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for DoctorError {}
