//! SP-initiated logout and the single logout endpoint

use crate::error::{SsoError, SsoResult};
use crate::handlers::{failure_redirect, require_session, SsoState};
use crate::services::{build_logout_response_redirect, parse_logout_request, parse_logout_response};
use crate::session::cookies::clear_session_cookie;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use utoipa::ToSchema;

/// Form posted to the SLO endpoint; exactly one of the two SAML fields
/// is expected.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SloForm {
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// End the local session and propagate logout to the IdP
#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 303, description = "Redirect to IdP SLO or home"),
    ),
    tag = "SSO"
)]
pub async fn get_logout(State(state): State<SsoState>, headers: HeaderMap) -> Response {
    match handle_logout(&state, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle_logout(state: &SsoState, headers: &HeaderMap) -> SsoResult<Response> {
    // Unauthenticated callers bounce home without touching any state.
    let (session_id, record) = require_session(state, headers).await?;

    state.cache.delete(&record.name_id).await;
    state.sessions.remove(session_id).await;

    tracing::info!(
        name_id = %record.name_id,
        session_index = ?record.session_index,
        "Local session terminated"
    );

    let target = match state.client.logout_redirect(&record, "/") {
        Ok(Some(url)) => url.to_string(),
        Ok(None) => "/".to_string(),
        Err(e) => {
            // Local logout already happened; a broken IdP exchange must
            // not resurrect the session.
            tracing::warn!(error = %e, "LogoutRequest could not be built");
            "/".to_string()
        }
    };

    let mut response_headers = HeaderMap::new();
    append_clear_session(&mut response_headers, state.secure_cookies);

    Ok((response_headers, Redirect::to(&target)).into_response())
}

/// Single logout endpoint for both directions of the exchange
#[utoipa::path(
    post,
    path = "/slo",
    request_body = SloForm,
    responses(
        (status = 303, description = "Redirect to IdP or home"),
    ),
    tag = "SSO"
)]
pub async fn slo_post(State(state): State<SsoState>, Form(form): Form<SloForm>) -> Response {
    match handle_slo(&state, &form).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "SLO message rejected");
            failure_redirect(&e.to_string(), state.secure_cookies)
        }
    }
}

async fn handle_slo(state: &SsoState, form: &SloForm) -> SsoResult<Response> {
    if let Some(saml_request) = form.saml_request.as_deref() {
        return handle_idp_initiated(state, saml_request, form.relay_state.as_deref()).await;
    }

    if let Some(saml_response) = form.saml_response.as_deref() {
        return handle_logout_completion(state, saml_response);
    }

    Err(SsoError::InvalidLogoutRequest(
        "Neither SAMLRequest nor SAMLResponse present".to_string(),
    ))
}

/// IdP-initiated logout: evict every session and cache entry the
/// request's session index names, then answer with a LogoutResponse.
async fn handle_idp_initiated(
    state: &SsoState,
    saml_request: &str,
    relay_state: Option<&str>,
) -> SsoResult<Response> {
    let parsed = parse_logout_request(saml_request)?;

    if parsed.issuer != state.config.idp_entity_id {
        return Err(SsoError::InvalidLogoutRequest(format!(
            "Unexpected LogoutRequest issuer: {}",
            parsed.issuer
        )));
    }

    // Correlate by session index only. A bare NameID in a logout
    // request must not evict sessions it cannot prove it owns.
    let success = match parsed.session_index.as_deref() {
        Some(session_index) => {
            let removed = state.sessions.remove_by_session_index(session_index).await;
            for record in &removed {
                state.cache.delete(&record.name_id).await;
            }
            tracing::info!(
                request_id = %parsed.id,
                session_index = %session_index,
                sessions_removed = removed.len(),
                "IdP-initiated logout processed"
            );
            true
        }
        None => {
            tracing::warn!(
                request_id = %parsed.id,
                name_id = %parsed.name_id,
                "LogoutRequest carries no SessionIndex, nothing evicted"
            );
            false
        }
    };

    let mut headers = HeaderMap::new();
    append_clear_session(&mut headers, state.secure_cookies);

    match build_logout_response_redirect(&state.config, &parsed.id, relay_state, success) {
        Ok(url) => Ok((headers, Redirect::to(url.as_str())).into_response()),
        Err(e) => {
            tracing::warn!(error = %e, "LogoutResponse could not be built");
            Ok((headers, Redirect::to("/")).into_response())
        }
    }
}

/// IdP's answer to our own LogoutRequest; the local session is already
/// gone, so this only closes the loop.
fn handle_logout_completion(state: &SsoState, saml_response: &str) -> SsoResult<Response> {
    let parsed = parse_logout_response(saml_response)?;

    if parsed.success {
        tracing::info!(in_response_to = ?parsed.in_response_to, "IdP confirmed logout");
    } else {
        tracing::warn!(
            in_response_to = ?parsed.in_response_to,
            "IdP reported logout failure"
        );
    }

    let mut headers = HeaderMap::new();
    append_clear_session(&mut headers, state.secure_cookies);

    Ok((headers, Redirect::to("/")).into_response())
}

fn append_clear_session(headers: &mut HeaderMap, secure: bool) {
    if let Ok(value) = clear_session_cookie(secure).parse() {
        headers.append(header::SET_COOKIE, value);
    }
}
