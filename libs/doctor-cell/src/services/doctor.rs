use anyhow::Result;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError, DoctorFilters, FilterOptions};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// All doctors, newest first.
    pub async fn list_doctors(&self, auth_token: Option<&str>) -> Result<Vec<Doctor>> {
        self.filter_doctors(&DoctorFilters::default(), auth_token).await
    }

    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Doctor> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}&limit=1", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        let doctor: Doctor = serde_json::from_value(row)?;
        Ok(doctor)
    }

    /// Equality filters on specialty and city; empty filters list everyone.
    pub async fn filter_doctors(
        &self,
        filters: &DoctorFilters,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>> {
        debug!("Fetching doctors with filters: {:?}", filters);

        let mut query_parts = vec!["select=*".to_string()];
        if let Some(specialty) = filters.specialty.as_deref().filter(|s| !s.is_empty()) {
            query_parts.push(format!("specialty=eq.{}", urlencoding::encode(specialty)));
        }
        if let Some(city) = filters.city.as_deref().filter(|c| !c.is_empty()) {
            query_parts.push(format!("city=eq.{}", urlencoding::encode(city)));
        }
        query_parts.push("order=created_at.desc".to_string());

        let path = format!("/rest/v1/doctors?{}", query_parts.join("&"));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let doctors = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Doctor>, _>>()?;

        debug!("Found {} doctors", doctors.len());
        Ok(doctors)
    }

    pub async fn filter_options(&self, auth_token: Option<&str>) -> Result<FilterOptions> {
        let doctors = self.list_doctors(auth_token).await?;
        Ok(FilterOptions::from_doctors(&doctors))
    }
}
