use tracing::{error, info, instrument, warn};

use patient_cell::models::CreatePatientRequest;
use patient_cell::services::PatientService;
use shared_config::AppConfig;

use crate::models::{AuthError, PatientSession, RegisterRequest, Registration};
use crate::services::auth::AuthClient;

/// Patient-facing account flows built on Supabase Auth and the patients table.
pub struct AccountService {
    auth: AuthClient,
    patients: PatientService,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            auth: AuthClient::new(config),
            patients: PatientService::new(config),
        }
    }

    /// Only accounts with a patient profile may sign in; any other account is
    /// signed straight back out.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<PatientSession, AuthError> {
        let session = self.auth.sign_in_with_password(email.trim(), password).await?;
        let user_id = session.user.id.to_string();

        let lookup = self.patients.get_by_user_id(&user_id, &session.access_token).await;
        let failure = match lookup {
            Ok(Some(patient)) => {
                info!("Patient {} signed in", patient.id);
                return Ok(PatientSession { session, patient });
            }
            Ok(None) => AuthError::NotAPatient,
            Err(e) => AuthError::Upstream(e.to_string()),
        };

        warn!("Sign-in for user {} refused: {}", user_id, failure);
        if let Err(e) = self.auth.sign_out(&session.access_token).await {
            warn!("Could not revoke session for user {}: {}", user_id, e);
        }
        Err(failure)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register_patient(&self, request: RegisterRequest) -> Result<Registration, AuthError> {
        request.validate()?;
        let phone = request.normalized_phone();

        if let Some(phone) = &phone {
            let existing = self.patients
                .find_by_phone(phone, self.auth.privileged_token())
                .await
                .map_err(|e| AuthError::Upstream(e.to_string()))?;
            if existing.is_some() {
                return Err(AuthError::PhoneAlreadyRegistered);
            }
        }

        let signed_up = self.auth.sign_up(request.email.trim(), &request.password).await?;
        let user_id = signed_up.user.id;

        let token = signed_up.session.as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.auth.privileged_token().to_string());
        let profile = CreatePatientRequest::from_full_name(user_id, &request.full_name, phone);

        let patient = match self.patients.create_patient(profile, &token).await {
            Ok(patient) => patient,
            Err(e) => {
                error!("Patient profile insert failed for user {}: {}", user_id, e);
                // Do not leave an auth account without a patient behind.
                if let Err(cleanup) = self.auth.delete_user(user_id).await {
                    error!("Rollback of auth user {} failed: {}", user_id, cleanup);
                }
                return Err(AuthError::ProfileCreation(e.to_string()));
            }
        };

        info!("Registered patient {} for user {}", patient.id, user_id);
        Ok(Registration { patient, session: signed_up.session })
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.auth.sign_out(access_token).await
    }
}
