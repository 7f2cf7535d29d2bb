//! SP metadata endpoint

use crate::config::SamlConfig;
use crate::error::SsoResult;
use crate::ledger::RequestLedger;
use crate::services::{generate_sp_metadata, AssertionValidator, SamlClient};
use crate::session::{BrowserSessions, IdentityCache};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Shared state for the broker routes
#[derive(Clone)]
pub struct SsoState {
    pub config: Arc<SamlConfig>,
    pub client: SamlClient,
    pub cache: Arc<IdentityCache>,
    pub sessions: Arc<BrowserSessions>,
    pub ledger: Arc<dyn RequestLedger>,
    pub validator: Arc<dyn AssertionValidator>,
    /// TTL applied to pending AuthnRequests recorded in the ledger
    pub ledger_ttl_seconds: i64,
    /// Set the Secure attribute on cookies (behind TLS)
    pub secure_cookies: bool,
}

/// SP metadata document
#[utoipa::path(
    get,
    path = "/metadata",
    responses(
        (status = 200, description = "SP EntityDescriptor XML"),
        (status = 500, description = "Service provider misconfigured"),
    ),
    tag = "SSO"
)]
pub async fn get_metadata(State(state): State<SsoState>) -> Response {
    match handle_metadata(&state) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Metadata generation failed");
            e.into_response()
        }
    }
}

fn handle_metadata(state: &SsoState) -> SsoResult<Response> {
    state.config.validate()?;

    let xml = generate_sp_metadata(&state.config);

    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}
