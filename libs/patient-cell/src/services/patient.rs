use anyhow::{Result, anyhow};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Patient, CreatePatientRequest};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Profile for an auth user, if the account was registered as a patient.
    pub async fn get_by_user_id(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>> {
        debug!("Fetching patient profile for user: {}", user_id);

        let path = format!("/rest/v1/patients?user_id=eq.{}&limit=1", urlencoding::encode(user_id));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => {
                debug!("No patient data found for user: {}", user_id);
                Ok(None)
            }
        }
    }

    pub async fn find_by_phone(
        &self,
        phone: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>> {
        let path = format!("/rest/v1/patients?phone=eq.{}&limit=1", urlencoding::encode(phone));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Creating patient profile for user: {}", request.user_id);

        let patient_data = json!({
            "user_id": request.user_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone": request.phone,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(auth_token),
            Some(patient_data),
            Some(SupabaseClient::return_representation()),
        ).await?;

        let row = result.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create patient profile"))?;

        let patient: Patient = serde_json::from_value(row)?;
        debug!("Patient profile created with ID: {}", patient.id);

        Ok(patient)
    }
}
