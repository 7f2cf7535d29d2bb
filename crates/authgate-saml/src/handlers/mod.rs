//! HTTP handlers for the broker routes

pub mod details;
pub mod login;
pub mod logout;
pub mod metadata;
pub mod sso;

pub use details::{get_data, get_details};
pub use login::{get_home, get_login, get_login_failed};
pub use logout::{get_logout, slo_post};
pub use metadata::{get_metadata, SsoState};
pub use sso::consume_assertion;

use crate::error::{SsoError, SsoResult};
use crate::session::cookies::{extract_session_cookie, set_flash_cookie};
use crate::session::IdentityRecord;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use uuid::Uuid;

/// Resolve the caller's browser session from the request cookies.
///
/// Absent cookie or stale session both map to `NotAuthenticated`, which
/// renders as a silent redirect home.
pub(crate) async fn require_session(
    state: &SsoState,
    headers: &HeaderMap,
) -> SsoResult<(Uuid, IdentityRecord)> {
    let session_id = extract_session_cookie(headers).ok_or(SsoError::NotAuthenticated)?;
    let record = state
        .sessions
        .get(session_id)
        .await
        .ok_or(SsoError::NotAuthenticated)?;
    Ok((session_id, record))
}

/// Redirect to the failure page carrying the reason in a flash cookie.
pub(crate) fn failure_redirect(message: &str, secure: bool) -> Response {
    let mut headers = HeaderMap::new();
    set_flash_cookie(&mut headers, message, secure);
    (headers, Redirect::to("/login_failed")).into_response()
}
