//! Identity publication and the polling lookup endpoint

use crate::error::{SsoError, SsoResult};
use crate::handlers::login::html_escape;
use crate::handlers::{require_session, SsoState};
use crate::session::IdentityResponse;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    Json,
};

/// Publish the authenticated identity into the cache and show it
#[utoipa::path(
    get,
    path = "/details",
    responses(
        (status = 200, description = "Identity view"),
        (status = 303, description = "No session, redirect home"),
    ),
    tag = "SSO"
)]
pub async fn get_details(State(state): State<SsoState>, headers: HeaderMap) -> Response {
    match handle_details(&state, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle_details(state: &SsoState, headers: &HeaderMap) -> SsoResult<Response> {
    let (_, record) = require_session(state, headers).await?;

    // Publication is what makes the identity visible to pollers; a page
    // reload republishes, resetting the cache entry's timers.
    state.cache.put(&record.name_id, record.clone()).await;

    tracing::debug!(name_id = %record.name_id, "Identity published to cache");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login successful</title></head>
<body>
    <h1>Login successful</h1>
    <p>Signed in as <strong>{}</strong></p>
    <p><a href="/logout">Sign out</a></p>
</body>
</html>"#,
        html_escape(&record.name_id)
    );

    Ok(Html(html).into_response())
}

/// Poll the identity cache by NameID
#[utoipa::path(
    get,
    path = "/data/{id}",
    params(("id" = String, Path, description = "Subject NameID")),
    responses(
        (status = 200, description = "Cached identity", body = IdentityResponse),
        (status = 404, description = "No visible entry for this key"),
    ),
    tag = "SSO"
)]
pub async fn get_data(State(state): State<SsoState>, Path(id): Path<String>) -> Response {
    match handle_data(&state, &id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle_data(state: &SsoState, id: &str) -> SsoResult<Response> {
    let record = state.cache.get(id).await.ok_or(SsoError::NotFound)?;

    Ok(Json(IdentityResponse::from(record)).into_response())
}
