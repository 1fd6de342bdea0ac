use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{AuthError, AuthUser, Session, SignUpOutcome};

/// Best human-readable message out of a Supabase Auth error body.
fn auth_message(err: &SupabaseError) -> String {
    let body = match err {
        SupabaseError::Api { body, .. }
        | SupabaseError::Auth(body)
        | SupabaseError::NotFound(body)
        | SupabaseError::Conflict(body) => body,
        other => return other.to_string(),
    };

    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| err.to_string())
}

fn rejected(err: SupabaseError) -> AuthError {
    match err {
        SupabaseError::Transport(_) | SupabaseError::InvalidHeader(_) | SupabaseError::Decode(_) => {
            AuthError::Upstream(err.to_string())
        }
        other => AuthError::Rejected(auth_message(&other)),
    }
}

/// Thin client over the Supabase Auth (GoTrue) endpoints.
pub struct AuthClient {
    supabase: SupabaseClient,
    admin: Option<SupabaseClient>,
}

impl AuthClient {
    pub fn new(config: &AppConfig) -> Self {
        let admin = config
            .can_administer_users()
            .then(|| SupabaseClient::with_service_role(config));

        Self {
            supabase: SupabaseClient::new(config),
            admin,
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        debug!("Signing in {}", email);

        self.supabase.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({ "email": email, "password": password })),
        ).await.map_err(rejected)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        debug!("Signing up {}", email);

        let payload: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({ "email": email, "password": password })),
        ).await.map_err(rejected)?;

        // With auto-confirm the body is a session, otherwise the bare user.
        if payload.get("access_token").is_some() {
            let session: Session = serde_json::from_value(payload)
                .map_err(|e| AuthError::Upstream(e.to_string()))?;
            return Ok(SignUpOutcome { user: session.user.clone(), session: Some(session) });
        }

        let user_value = payload.get("user").cloned().unwrap_or(payload);
        let user: AuthUser = serde_json::from_value(user_value)
            .map_err(|e| AuthError::Upstream(e.to_string()))?;
        Ok(SignUpOutcome { user, session: None })
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.supabase.execute(
            Method::POST,
            "/auth/v1/logout",
            Some(access_token),
            None,
        ).await.map_err(rejected)
    }

    /// Admin removal of an auth user. Needs the service-role key.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        let Some(admin) = &self.admin else {
            warn!("Cannot delete auth user {}: no service role key configured", user_id);
            return Err(AuthError::Upstream("service role key not configured".to_string()));
        };

        let path = format!("/auth/v1/admin/users/{}", user_id);
        admin.execute(Method::DELETE, &path, Some(admin.api_key()), None)
            .await
            .map_err(|e| {
                error!("Failed to delete auth user {}: {}", user_id, e);
                rejected(e)
            })
    }

    /// Token that may read and write patient rows before the new user has a
    /// session: the service role when available, else the anon key.
    pub fn privileged_token(&self) -> &str {
        match &self.admin {
            Some(admin) => admin.api_key(),
            None => self.supabase.api_key(),
        }
    }
}
