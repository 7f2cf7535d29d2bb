//! Assertion consumer service (HTTP-POST binding)

use crate::error::{SsoError, SsoResult};
use crate::handlers::login::is_local_path;
use crate::handlers::{failure_redirect, SsoState};
use crate::services::extract_in_response_to;
use crate::session::cookies::set_session_cookie;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use utoipa::ToSchema;

/// Form posted by the IdP to the ACS endpoint
#[derive(Debug, Deserialize, ToSchema)]
pub struct SsoResponseForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Consume a SAML response and establish a browser session
#[utoipa::path(
    post,
    path = "/sso",
    request_body = SsoResponseForm,
    responses(
        (status = 303, description = "Session established, redirect onward"),
    ),
    tag = "SSO"
)]
pub async fn consume_assertion(
    State(state): State<SsoState>,
    Form(form): Form<SsoResponseForm>,
) -> Response {
    match handle_assertion(&state, &form).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Assertion rejected");
            failure_redirect(&e.to_string(), state.secure_cookies)
        }
    }
}

async fn handle_assertion(state: &SsoState, form: &SsoResponseForm) -> SsoResult<Response> {
    // Correlate with the pending request before cryptographic checks.
    // A response naming an unknown or already-consumed request ID is a
    // replay; a response with no InResponseTo is IdP-initiated and is
    // accepted as unsolicited.
    let (expected_ids, ledger_relay) = match extract_in_response_to(&form.saml_response)? {
        Some(in_response_to) => {
            let pending = state.ledger.take(&in_response_to).await?.ok_or_else(|| {
                SsoError::AssertionValidation(
                    "Response does not match any pending request".to_string(),
                )
            })?;
            (vec![pending.request_id], pending.relay_state)
        }
        None => (Vec::new(), None),
    };

    let record = state.validator.validate(&form.saml_response, &expected_ids)?;

    let session_id = state.sessions.create(record.clone()).await;

    tracing::info!(
        name_id = %record.name_id,
        session_index = ?record.session_index,
        unsolicited = expected_ids.is_empty(),
        "SSO session established"
    );

    let target = form
        .relay_state
        .as_deref()
        .or(ledger_relay.as_deref())
        .filter(|p| is_local_path(p))
        .unwrap_or("/details");

    let mut headers = HeaderMap::new();
    set_session_cookie(&mut headers, session_id, state.secure_cookies);

    Ok((headers, Redirect::to(target)).into_response())
}
