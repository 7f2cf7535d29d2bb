//! Assertion validation behind a trait so handlers can be tested with a
//! stub instead of signed XML fixtures.

use crate::config::SamlConfig;
use crate::error::{SsoError, SsoResult};
use crate::services::client::SamlClient;
use crate::session::IdentityRecord;
use base64::{engine::general_purpose::STANDARD, Engine};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;

/// Validates a base64 `SAMLResponse` and extracts the subject identity.
pub trait AssertionValidator: Send + Sync {
    /// Verify the response and return the asserted identity.
    ///
    /// `expected_request_ids` holds the outstanding `AuthnRequest` ID
    /// matched from the response's `InResponseTo`, if any; an empty slice
    /// means the response is treated as unsolicited.
    fn validate(
        &self,
        saml_response_b64: &str,
        expected_request_ids: &[String],
    ) -> SsoResult<IdentityRecord>;
}

/// Production validator delegating signature and schema checks to the
/// `samael` service provider.
pub struct SamlAssertionValidator {
    client: SamlClient,
}

impl SamlAssertionValidator {
    #[must_use]
    pub fn new(config: Arc<SamlConfig>) -> Self {
        Self {
            client: SamlClient::new(config),
        }
    }
}

impl AssertionValidator for SamlAssertionValidator {
    fn validate(
        &self,
        saml_response_b64: &str,
        expected_request_ids: &[String],
    ) -> SsoResult<IdentityRecord> {
        // Without the unsolicited flag, samael fails every response whose
        // InResponseTo cannot be matched, including responses that carry none.
        let unsolicited = expected_request_ids.is_empty();
        let sp = self.client.build_sp(unsolicited)?;

        let ids: Vec<&str> = expected_request_ids.iter().map(String::as_str).collect();
        let possible_ids = if unsolicited { None } else { Some(ids.as_slice()) };

        let assertion = sp
            .parse_base64_response(saml_response_b64, possible_ids)
            .map_err(|e| SsoError::AssertionValidation(format!("Response rejected: {e}")))?;

        if let Some(issuer) = assertion.issuer.value.as_deref() {
            if issuer != self.client.config().idp_entity_id {
                return Err(SsoError::AssertionValidation(format!(
                    "Unexpected assertion issuer: {issuer}"
                )));
            }
        }

        check_audience(self.client.config(), saml_response_b64)?;

        let name_id = assertion
            .subject
            .as_ref()
            .and_then(|s| s.name_id.as_ref())
            .ok_or_else(|| {
                SsoError::AssertionValidation("Assertion has no subject NameID".to_string())
            })?;

        let session_index = assertion
            .authn_statements
            .as_ref()
            .and_then(|statements| statements.first())
            .and_then(|statement| statement.session_index.clone());

        tracing::debug!(
            name_id = %name_id.value,
            session_index = ?session_index,
            "assertion validated"
        );

        subject_identity(&name_id.value, name_id.format.clone(), session_index)
    }
}

/// Build the identity record for a validated assertion.
///
/// A blank NameID would become an empty broker key, so it is rejected
/// here rather than silently published.
fn subject_identity(
    name_id_value: &str,
    name_id_format: Option<String>,
    session_index: Option<String>,
) -> SsoResult<IdentityRecord> {
    if name_id_value.trim().is_empty() {
        return Err(SsoError::AssertionValidation(
            "Assertion subject NameID is empty".to_string(),
        ));
    }

    Ok(IdentityRecord {
        name_id: name_id_value.to_string(),
        name_id_format,
        session_index,
    })
}

/// Enforce the configured audience restriction, if any.
///
/// `samael` verifies signatures and timestamps but leaves audience policy
/// to the caller, so the `<Audience>` values are read from the raw XML.
fn check_audience(config: &SamlConfig, saml_response_b64: &str) -> SsoResult<()> {
    let Some(expected) = config.audience.as_deref() else {
        return Ok(());
    };

    let xml = STANDARD
        .decode(saml_response_b64)
        .map_err(|e| SsoError::AssertionValidation(format!("Invalid base64 response: {e}")))?;
    let xml = String::from_utf8_lossy(&xml);

    let audiences = extract_audiences(&xml)?;
    if audiences.is_empty() {
        // No restriction asserted; nothing to enforce.
        return Ok(());
    }

    if audiences.iter().any(|a| a == expected) {
        Ok(())
    } else {
        Err(SsoError::AssertionValidation(format!(
            "Audience restriction does not include {expected}"
        )))
    }
}

fn extract_audiences(xml: &str) -> SsoResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut audiences = Vec::new();
    let mut in_audience = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = name.local_name();
                if local.as_ref() == b"Audience" {
                    in_audience = true;
                }
            }
            Ok(Event::Text(t)) if in_audience => {
                let value = t
                    .unescape()
                    .map_err(|e| {
                        SsoError::AssertionValidation(format!("Malformed audience value: {e}"))
                    })?
                    .into_owned();
                audiences.push(value);
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if name.local_name().as_ref() == b"Audience" {
                    in_audience = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SsoError::AssertionValidation(format!(
                    "Malformed response XML: {e}"
                )));
            }
            _ => {}
        }
    }

    Ok(audiences)
}
