use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use patient_cell::models::Patient;
use shared_models::auth::User;

// ==============================================================================
// SUPABASE AUTH MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<&User> for AuthUser {
    type Error = AuthError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AuthError::Validation(format!("token subject '{}' is not a user id", user.id)))?;
        Ok(Self {
            id,
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Session rebuilt from an already-validated bearer token.
    pub fn from_bearer(access_token: &str, user: AuthUser) -> Self {
        Self {
            access_token: access_token.to_string(),
            token_type: default_token_type(),
            expires_in: None,
            refresh_token: None,
            user,
        }
    }
}

/// Sign-up either signs the user straight in or waits for email confirmation.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("A valid email address is required".to_string()));
        }
        if self.password.chars().count() < 6 {
            return Err(AuthError::Validation("Password must be at least 6 characters".to_string()));
        }
        if self.full_name.trim().is_empty() {
            return Err(AuthError::Validation("Full name is required".to_string()));
        }
        Ok(())
    }

    /// Phone with surrounding whitespace removed; blank counts as absent.
    pub fn normalized_phone(&self) -> Option<String> {
        self.phone.as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }
}

/// A signed-in patient: the auth session plus the matching profile.
#[derive(Debug, Clone, Serialize)]
pub struct PatientSession {
    pub session: Session,
    pub patient: Patient,
}

/// Newly registered patient; `session` is absent while email confirmation is pending.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub patient: Patient,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
}

impl AuthResponse {
    pub fn ok() -> Self {
        Self { success: true, error: None, session: None, patient: None }
    }

    pub fn signed_in(signed_in: PatientSession) -> Self {
        Self {
            success: true,
            error: None,
            session: Some(signed_in.session),
            patient: Some(signed_in.patient),
        }
    }

    pub fn registered(registration: Registration) -> Self {
        Self {
            success: true,
            error: None,
            session: registration.session,
            patient: Some(registration.patient),
        }
    }

    pub fn failed(error: &AuthError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            session: None,
            patient: None,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// Message reported by Supabase Auth, passed through verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("This account is not registered as a patient")]
    NotAPatient,

    #[error("This phone number is already registered")]
    PhoneAlreadyRegistered,

    #[error("{0}")]
    Validation(String),

    #[error("Failed to create patient profile: {0}")]
    ProfileCreation(String),

    #[error("Authentication service error: {0}")]
    Upstream(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Rejected(_) => StatusCode::UNAUTHORIZED,
            AuthError::NotAPatient => StatusCode::FORBIDDEN,
            AuthError::PhoneAlreadyRegistered => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::ProfileCreation(_) | AuthError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
