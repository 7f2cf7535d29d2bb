//! Broker route definitions

use crate::handlers::{
    consume_assertion, get_data, get_details, get_home, get_login, get_login_failed, get_logout,
    get_metadata, slo_post, SsoState,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Create the broker router with all routes mounted at the root
pub fn sso_router(state: SsoState) -> Router {
    Router::new()
        .route("/", get(get_home))
        .route("/metadata", get(get_metadata))
        .route("/login", get(get_login))
        .route("/sso", post(consume_assertion))
        .route("/login_failed", get(get_login_failed))
        .route("/details", get(get_details))
        .route("/data/:id", get(get_data))
        .route("/logout", get(get_logout))
        .route("/slo", post(slo_post))
        .with_state(state)
}
