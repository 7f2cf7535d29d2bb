//! Shared fixtures for the router integration tests.

#![allow(dead_code)]

use authgate_saml::{
    sso_router, AssertionValidator, BrowserSessions, IdentityCache, IdentityRecord,
    InMemoryRequestLedger, SamlClient, SamlConfig, SignatureAlgorithm, SsoError, SsoResult,
    SsoState,
};
use axum::http::header;
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;

/// Validator stub: returns a fixed identity or a fixed rejection,
/// avoiding signed XML fixtures.
pub struct StubValidator {
    outcome: Option<IdentityRecord>,
}

impl StubValidator {
    pub fn accepting(record: IdentityRecord) -> Self {
        Self {
            outcome: Some(record),
        }
    }

    pub fn rejecting() -> Self {
        Self { outcome: None }
    }
}

impl AssertionValidator for StubValidator {
    fn validate(&self, _response: &str, _expected_ids: &[String]) -> SsoResult<IdentityRecord> {
        self.outcome
            .clone()
            .ok_or_else(|| SsoError::AssertionValidation("Signature invalid".to_string()))
    }
}

pub fn test_saml_config() -> SamlConfig {
    SamlConfig {
        sp_entity_id: "urn:example:sp".to_string(),
        acs_url: "http://localhost:3000/sso".to_string(),
        slo_url: "http://localhost:3000/slo".to_string(),
        idp_sso_url: "http://localhost:7000/saml/sso".to_string(),
        idp_slo_url: Some("http://localhost:7000/saml/slo".to_string()),
        idp_entity_id: "urn:example:idp".to_string(),
        audience: None,
        idp_certificate: None,
        sp_private_key: None,
        sp_certificate: None,
        signature_algorithm: SignatureAlgorithm::Sha256,
    }
}

pub fn test_record() -> IdentityRecord {
    IdentityRecord {
        name_id: "jackson@example.com".to_string(),
        name_id_format: Some(
            "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress".to_string(),
        ),
        session_index: Some("_abc123".to_string()),
    }
}

pub fn create_test_state(validator: Arc<dyn AssertionValidator>) -> SsoState {
    create_test_state_with_config(validator, test_saml_config())
}

pub fn create_test_state_with_config(
    validator: Arc<dyn AssertionValidator>,
    config: SamlConfig,
) -> SsoState {
    let config = Arc::new(config);
    SsoState {
        config: config.clone(),
        client: SamlClient::new(config.clone()),
        cache: Arc::new(IdentityCache::new()),
        sessions: Arc::new(BrowserSessions::new()),
        ledger: Arc::new(InMemoryRequestLedger::new()),
        validator,
        ledger_ttl_seconds: 300,
        secure_cookies: false,
    }
}

pub fn test_app(state: SsoState) -> Router {
    sso_router(state)
}

/// Base64 of a minimal unsolicited `samlp:Response`.
pub fn encoded_response() -> String {
    let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_resp1"/>"#;
    STANDARD.encode(xml)
}

/// URL-encoded form body carrying one field.
pub fn form_body(field: &str, value: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair(field, value)
        .finish()
}

/// Pull the session cookie pair out of a response's Set-Cookie headers.
pub fn session_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("authgate_session="))
        .map(|v| v.split(';').next().unwrap_or(v).to_string())
}
