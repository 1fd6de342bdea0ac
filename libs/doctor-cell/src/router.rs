use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use shared_config::AppConfig;

use crate::handlers;

/// Directory reads are public; the anon key alone is enough under RLS.
pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/filters", get(handlers::get_filter_options))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .with_state(state)
}
