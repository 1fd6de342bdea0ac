use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::context::{AppContext, AuthEvent};
use crate::models::{AuthResponse, AuthUser, RegisterRequest, Session, SignInRequest};
use crate::services::AccountService;

type AuthReply = (StatusCode, Json<AuthResponse>);

pub async fn sign_in(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SignInRequest>,
) -> AuthReply {
    match AccountService::new(&config).sign_in(&request.email, &request.password).await {
        Ok(signed_in) => (StatusCode::OK, Json(AuthResponse::signed_in(signed_in))),
        Err(e) => (e.status_code(), Json(AuthResponse::failed(&e))),
    }
}

pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> AuthReply {
    match AccountService::new(&config).register_patient(request).await {
        Ok(registration) => (StatusCode::CREATED, Json(AuthResponse::registered(registration))),
        Err(e) => (e.status_code(), Json(AuthResponse::failed(&e))),
    }
}

#[axum::debug_handler]
pub async fn sign_out(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> AuthReply {
    match AccountService::new(&config).sign_out(auth.token()).await {
        Ok(()) => (StatusCode::OK, Json(AuthResponse::ok())),
        Err(e) => (e.status_code(), Json(AuthResponse::failed(&e))),
    }
}

/// Context for the bearer's session: who they are, their patient profile and
/// the doctor directory.
#[axum::debug_handler]
pub async fn get_session(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Building session context for user: {}", user.id);

    let auth_user = AuthUser::try_from(&user).map_err(|e| AppError::Auth(e.to_string()))?;
    let mut context = AppContext::new(config);
    context
        .handle_auth_event(AuthEvent::SignedIn(Session::from_bearer(auth.token(), auth_user)))
        .await;

    let snapshot = context
        .snapshot()
        .ok_or_else(|| AppError::Internal("session context was not initialised".to_string()))?;

    Ok(Json(json!({ "data": snapshot, "error": null })))
}
