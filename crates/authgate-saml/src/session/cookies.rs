//! Session and flash cookie plumbing.
//!
//! The session cookie carries only an opaque UUID; the identity record
//! stays server-side. The flash cookie carries a one-shot failure message
//! for the login-failed view and is cleared as soon as it is rendered.
//! Both are `HttpOnly` with `SameSite=Lax` (the SSO callback is a
//! cross-site POST from the IdP, so `Strict` would drop the session
//! cookie on the redirect that follows).

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use uuid::Uuid;

/// Cookie name for browser sessions.
pub const SESSION_COOKIE_NAME: &str = "authgate_session";

/// Cookie name for one-shot failure messages.
pub const FLASH_COOKIE_NAME: &str = "authgate_flash";

/// Session cookie max age in seconds (8 hours).
pub const SESSION_COOKIE_MAX_AGE: i64 = 8 * 60 * 60;

/// Flash cookie max age in seconds (5 minutes).
pub const FLASH_COOKIE_MAX_AGE: i64 = 5 * 60;

/// Build the session cookie header value.
#[must_use]
pub fn create_session_cookie(session_id: Uuid, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE_NAME}={session_id}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={SESSION_COOKIE_MAX_AGE}"
    )
}

/// Set the session cookie in response headers.
pub fn set_session_cookie(headers: &mut HeaderMap, session_id: Uuid, secure: bool) {
    let cookie_value = create_session_cookie(session_id, secure);
    if let Ok(value) = HeaderValue::from_str(&cookie_value) {
        headers.append(SET_COOKIE, value);
    }
}

/// Extract the session ID from request cookies.
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    cookie_value(headers, SESSION_COOKIE_NAME).and_then(|v| Uuid::parse_str(v.trim()).ok())
}

/// Build the cookie header value that clears the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE_NAME}=; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age=0")
}

/// Set a one-shot flash message cookie.
///
/// The message is percent-encoded so arbitrary failure text survives the
/// cookie grammar.
pub fn set_flash_cookie(headers: &mut HeaderMap, message: &str, secure: bool) {
    let secure_flag = if secure { "; Secure" } else { "" };
    let encoded = percent_encode(message);
    let cookie_value = format!(
        "{FLASH_COOKIE_NAME}={encoded}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={FLASH_COOKIE_MAX_AGE}"
    );
    if let Ok(value) = HeaderValue::from_str(&cookie_value) {
        headers.append(SET_COOKIE, value);
    }
}

/// Read the flash message from request cookies.
pub fn extract_flash_cookie(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, FLASH_COOKIE_NAME).map(percent_decode)
}

/// Build the cookie header value that clears the flash cookie.
#[must_use]
pub fn clear_flash_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{FLASH_COOKIE_NAME}=; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age=0")
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;

    // Cookie header format: "name1=value1; name2=value2"
    for part in cookie_str.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(name) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value);
            }
        }
    }
    None
}

/// Form-encoding keeps the flash text within the cookie-octet grammar:
/// no semicolons, commas, whitespace, or double quotes survive.
fn percent_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn percent_decode(s: &str) -> String {
    url::form_urlencoded::parse(s.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}
