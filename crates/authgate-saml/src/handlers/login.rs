//! Login initiation and the public HTML views

use crate::error::SsoResult;
use crate::handlers::{failure_redirect, SsoState};
use crate::ledger::PendingRequest;
use crate::session::cookies::{clear_flash_cookie, extract_flash_cookie};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters for login initiation
#[derive(Debug, Deserialize, IntoParams)]
pub struct LoginQuery {
    /// Local path to return to after authentication
    pub return_to: Option<String>,
}

/// Landing page
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Home page")),
    tag = "SSO"
)]
pub async fn get_home() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>SSO Broker</title></head>
<body>
    <h1>SSO Broker</h1>
    <p><a href="/login">Sign in with your identity provider</a></p>
</body>
</html>"#,
    )
}

/// Start SP-initiated login by redirecting to the IdP
#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses(
        (status = 303, description = "Redirect to the IdP SSO endpoint"),
    ),
    tag = "SSO"
)]
pub async fn get_login(
    State(state): State<SsoState>,
    Query(query): Query<LoginQuery>,
) -> Response {
    match handle_login(&state, query.return_to.as_deref()).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Login initiation failed");
            // Never bounce back to /login: that would loop the browser.
            failure_redirect("Unable to start sign-in", state.secure_cookies)
        }
    }
}

async fn handle_login(state: &SsoState, return_to: Option<&str>) -> SsoResult<Response> {
    let relay_state = match return_to {
        Some(path) if is_local_path(path) => path,
        _ => "/details",
    };

    let (url, request_id) = state.client.login_redirect(relay_state)?;

    state
        .ledger
        .create(PendingRequest::with_ttl(
            request_id.clone(),
            Some(relay_state.to_string()),
            state.ledger_ttl_seconds,
        ))
        .await?;

    tracing::info!(request_id = %request_id, "Login initiated");

    Ok(Redirect::to(url.as_str()).into_response())
}

/// Login failure page
#[utoipa::path(
    get,
    path = "/login_failed",
    responses((status = 200, description = "Failure page")),
    tag = "SSO"
)]
pub async fn get_login_failed(State(state): State<SsoState>, headers: HeaderMap) -> Response {
    let reason = extract_flash_cookie(&headers)
        .unwrap_or_else(|| "Authentication did not complete".to_string());

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login failed</title></head>
<body>
    <h1>Login failed</h1>
    <p>{}</p>
    <p><a href="/login">Try again</a></p>
</body>
</html>"#,
        html_escape(&reason)
    );

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = clear_flash_cookie(state.secure_cookies).parse() {
        response_headers.append(header::SET_COOKIE, value);
    }

    (response_headers, Html(html)).into_response()
}

/// Accept only same-origin paths as redirect targets.
pub(crate) fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
