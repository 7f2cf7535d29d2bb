//! Single logout message handling.
//!
//! Parses inbound `LogoutRequest`/`LogoutResponse` XML and builds the
//! outbound `LogoutResponse` redirect for IdP-initiated logout.

use crate::config::SamlConfig;
use crate::error::{SsoError, SsoResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::{write::DeflateEncoder, Compression};
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::Write;
use url::Url;
use uuid::Uuid;

const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
const STATUS_RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";

/// Upper bound on a base64 SLO payload before decoding.
const MAX_SLO_PAYLOAD: usize = 512 * 1024;

/// Caps on individual fields pulled out of an SLO message. An IdP that
/// exceeds these is sending garbage, not a logout.
const MAX_ID_LEN: usize = 256;
const MAX_ISSUER_LEN: usize = 1024;
const MAX_NAME_ID_LEN: usize = 4096;

/// Identity data carried by an inbound `LogoutRequest`.
#[derive(Debug, Clone)]
pub struct ParsedLogoutRequest {
    pub id: String,
    pub issuer: String,
    pub name_id: String,
    pub name_id_format: String,
    pub session_index: Option<String>,
}

/// Outcome carried by an inbound `LogoutResponse`.
#[derive(Debug, Clone)]
pub struct ParsedLogoutResponse {
    pub in_response_to: Option<String>,
    pub success: bool,
}

/// Everything a single scan can pull out of either SLO message kind.
#[derive(Debug, Default)]
struct SloFields {
    root: String,
    id: Option<String>,
    in_response_to: Option<String>,
    issuer: Option<String>,
    name_id: Option<String>,
    name_id_format: Option<String>,
    session_index: Option<String>,
    status_code: Option<String>,
}

/// Parse a base64-encoded `LogoutRequest`.
pub fn parse_logout_request(encoded: &str) -> SsoResult<ParsedLogoutRequest> {
    parse_logout_request_xml(&decode_slo_payload(encoded)?)
}

/// Parse a `LogoutRequest` from raw XML.
pub fn parse_logout_request_xml(xml: &str) -> SsoResult<ParsedLogoutRequest> {
    let fields = scan_slo_message(xml)?;
    if fields.root != "LogoutRequest" {
        return Err(SsoError::InvalidLogoutRequest(format!(
            "Expected LogoutRequest, got {}",
            fields.root
        )));
    }

    let id = capped("ID", require(fields.id, "LogoutRequest ID")?, MAX_ID_LEN)?;
    let issuer = capped("Issuer", require(fields.issuer, "Issuer")?, MAX_ISSUER_LEN)?;
    let name_id = capped("NameID", require(fields.name_id, "NameID")?, MAX_NAME_ID_LEN)?;
    let session_index = fields
        .session_index
        .map(|si| capped("SessionIndex", si, MAX_ID_LEN))
        .transpose()?;

    Ok(ParsedLogoutRequest {
        id,
        issuer,
        name_id,
        name_id_format: fields.name_id_format.unwrap_or_default(),
        session_index,
    })
}

/// Parse a base64-encoded `LogoutResponse`.
pub fn parse_logout_response(encoded: &str) -> SsoResult<ParsedLogoutResponse> {
    parse_logout_response_xml(&decode_slo_payload(encoded)?)
}

/// Parse a `LogoutResponse` from raw XML.
pub fn parse_logout_response_xml(xml: &str) -> SsoResult<ParsedLogoutResponse> {
    let fields = scan_slo_message(xml)?;
    if fields.root != "LogoutResponse" {
        return Err(SsoError::InvalidLogoutRequest(format!(
            "Expected LogoutResponse, got {}",
            fields.root
        )));
    }

    let status_code = require(fields.status_code, "StatusCode")?;

    Ok(ParsedLogoutResponse {
        in_response_to: fields.in_response_to,
        success: status_code == STATUS_SUCCESS,
    })
}

fn decode_slo_payload(encoded: &str) -> SsoResult<String> {
    if encoded.len() > MAX_SLO_PAYLOAD {
        return Err(SsoError::InvalidLogoutRequest(
            "SLO message too large".to_string(),
        ));
    }

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| SsoError::InvalidLogoutRequest(format!("Base64 decode failed: {e}")))?;
    String::from_utf8(decoded)
        .map_err(|e| SsoError::InvalidLogoutRequest(format!("Invalid UTF-8: {e}")))
}

/// One pass over the document collecting every field either message kind
/// can carry. Namespace prefixes vary between IdPs, so elements are
/// matched by local name only.
fn scan_slo_message(xml: &str) -> SsoResult<SloFields> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = SloFields::default();
    let mut text_target = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match local.as_str() {
                    "LogoutRequest" | "LogoutResponse" if fields.root.is_empty() => {
                        fields.id = local_attr(e, b"ID");
                        fields.in_response_to = local_attr(e, b"InResponseTo");
                        fields.root = local.clone();
                        continue;
                    }
                    "NameID" => fields.name_id_format = local_attr(e, b"Format"),
                    "StatusCode" if fields.status_code.is_none() => {
                        fields.status_code = local_attr(e, b"Value");
                    }
                    _ => {}
                }
                text_target = Some(local);
            }
            Ok(Event::Text(ref t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| {
                        SsoError::InvalidLogoutRequest(format!("Malformed text content: {e}"))
                    })?
                    .into_owned();
                match text_target.as_deref() {
                    Some("Issuer") => fields.issuer = Some(value),
                    Some("NameID") => fields.name_id = Some(value),
                    Some("SessionIndex") => fields.session_index = Some(value),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => text_target = None,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SsoError::InvalidLogoutRequest(format!(
                    "XML parse error: {e}"
                )));
            }
            _ => {}
        }
    }

    if fields.root.is_empty() {
        return Err(SsoError::InvalidLogoutRequest(
            "Not an SLO message".to_string(),
        ));
    }

    Ok(fields)
}

/// Read one attribute off an element by local name.
fn local_attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn require(value: Option<String>, label: &str) -> SsoResult<String> {
    value.ok_or_else(|| SsoError::InvalidLogoutRequest(format!("Missing {label}")))
}

fn capped(label: &str, value: String, max: usize) -> SsoResult<String> {
    if value.len() > max {
        return Err(SsoError::InvalidLogoutRequest(format!(
            "{label} too long (max {max})"
        )));
    }
    Ok(value)
}

/// Extract the `InResponseTo` attribute from a base64 `SAMLResponse`
/// without validating it. Used to look up the pending request before
/// full validation runs.
pub fn extract_in_response_to(encoded: &str) -> SsoResult<Option<String>> {
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| SsoError::AssertionValidation(format!("Base64 decode failed: {e}")))?;
    let xml = String::from_utf8_lossy(&decoded);

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"Response" {
                    return Ok(local_attr(e, b"InResponseTo"));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(SsoError::AssertionValidation(format!(
                    "XML parse error: {e}"
                )));
            }
            _ => {}
        }
    }
}

/// Build the redirect URL carrying a `LogoutResponse` back to the IdP
/// after an IdP-initiated logout.
pub fn build_logout_response_redirect(
    config: &SamlConfig,
    in_response_to: &str,
    relay_state: Option<&str>,
    success: bool,
) -> SsoResult<Url> {
    let destination = config.idp_slo_url.as_deref().ok_or_else(|| {
        SsoError::Configuration("LogoutResponse requires SAML_IDP_SLO_URL".to_string())
    })?;

    let xml = build_logout_response_xml(config, destination, in_response_to, success);

    let mut compressed = Vec::new();
    {
        let mut encoder = DeflateEncoder::new(&mut compressed, Compression::default());
        encoder
            .write_all(xml.as_bytes())
            .map_err(|e| SsoError::Internal(format!("Failed to compress LogoutResponse: {e}")))?;
    }
    let encoded = STANDARD.encode(&compressed);

    let mut url: Url = destination
        .parse()
        .map_err(|e| SsoError::Configuration(format!("Invalid IdP SLO URL: {e}")))?;
    url.query_pairs_mut().append_pair("SAMLResponse", &encoded);
    if let Some(relay_state) = relay_state {
        if !relay_state.is_empty() {
            url.query_pairs_mut().append_pair("RelayState", relay_state);
        }
    }

    Ok(url)
}

fn build_logout_response_xml(
    config: &SamlConfig,
    destination: &str,
    in_response_to: &str,
    success: bool,
) -> String {
    let status_value = if success {
        STATUS_SUCCESS
    } else {
        STATUS_RESPONDER
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_lresp_{id}" Version="2.0" IssueInstant="{instant}" Destination="{destination}" InResponseTo="{in_response_to}">
    <saml:Issuer>{issuer}</saml:Issuer>
    <samlp:Status>
        <samlp:StatusCode Value="{status_value}"/>
    </samlp:Status>
</samlp:LogoutResponse>"#,
        id = Uuid::new_v4(),
        instant = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        destination = quick_xml::escape::escape(destination),
        in_response_to = quick_xml::escape::escape(in_response_to),
        issuer = quick_xml::escape::escape(config.sp_entity_id.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SamlConfig, SignatureAlgorithm};

    fn config() -> SamlConfig {
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

    fn logout_request_fixture(session_index: Option<&str>) -> String {
        let session_element = session_index
            .map(|si| format!("<samlp:SessionIndex>{si}</samlp:SessionIndex>"))
            .unwrap_or_default();
        format!(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_slo_req_7" Version="2.0" IssueInstant="2026-08-30T09:00:00Z" Destination="http://localhost:3000/slo">
    <saml:Issuer>urn:example:idp</saml:Issuer>
    <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">morgan@example.com</saml:NameID>
    {session_element}
</samlp:LogoutRequest>"#
        )
    }

    #[test]
    fn test_parse_logout_request_full() {
        let parsed = parse_logout_request_xml(&logout_request_fixture(Some("_sess_41"))).unwrap();

        assert_eq!(parsed.id, "_slo_req_7");
        assert_eq!(parsed.issuer, "urn:example:idp");
        assert_eq!(parsed.name_id, "morgan@example.com");
        assert_eq!(
            parsed.name_id_format,
            "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress"
        );
        assert_eq!(parsed.session_index.as_deref(), Some("_sess_41"));
    }

    #[test]
    fn test_parse_logout_request_without_session_index() {
        let parsed = parse_logout_request_xml(&logout_request_fixture(None)).unwrap();
        assert!(parsed.session_index.is_none());
    }

    #[test]
    fn test_parse_logout_request_missing_issuer() {
        let xml = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_slo_req_8" Version="2.0">
    <saml:NameID>morgan@example.com</saml:NameID>
</samlp:LogoutRequest>"#;

        assert!(parse_logout_request_xml(xml).is_err());
    }

    #[test]
    fn test_parse_logout_request_rejects_oversized_name_id() {
        let huge = "x".repeat(MAX_NAME_ID_LEN + 1);
        let xml = format!(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_slo_req_9" Version="2.0">
    <saml:Issuer>urn:example:idp</saml:Issuer>
    <saml:NameID>{huge}</saml:NameID>
</samlp:LogoutRequest>"#
        );

        assert!(parse_logout_request_xml(&xml).is_err());
    }

    #[test]
    fn test_parse_logout_request_rejects_wrong_root() {
        let xml = r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_x" Version="2.0">
    <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>
</samlp:LogoutResponse>"#;

        assert!(parse_logout_request_xml(xml).is_err());
    }

    #[test]
    fn test_parse_logout_response_success() {
        let xml = r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_slo_resp_3" Version="2.0" InResponseTo="_logout_91">
    <samlp:Status>
        <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>
    </samlp:Status>
</samlp:LogoutResponse>"#;

        let parsed = parse_logout_response_xml(xml).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.in_response_to.as_deref(), Some("_logout_91"));
    }

    #[test]
    fn test_parse_logout_response_failure_status() {
        let xml = r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_slo_resp_4" Version="2.0">
    <samlp:Status>
        <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Responder"/>
    </samlp:Status>
</samlp:LogoutResponse>"#;

        assert!(!parse_logout_response_xml(xml).unwrap().success);
    }

    #[test]
    fn test_extract_in_response_to() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_r1" InResponseTo="_req42"/>"#;
        let encoded = STANDARD.encode(xml);

        let result = extract_in_response_to(&encoded).unwrap();
        assert_eq!(result, Some("_req42".to_string()));
    }

    #[test]
    fn test_extract_in_response_to_unsolicited() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_r1"/>"#;
        let encoded = STANDARD.encode(xml);

        assert!(extract_in_response_to(&encoded).unwrap().is_none());
    }

    #[test]
    fn test_build_logout_response_redirect() {
        let url = build_logout_response_redirect(&config(), "_slo_req_7", Some("/"), true).unwrap();

        assert!(url.as_str().starts_with("http://localhost:7000/saml/slo"));
        assert!(url.query().unwrap().contains("SAMLResponse="));
        assert!(url.query().unwrap().contains("RelayState="));
    }

    #[test]
    fn test_logout_response_xml_escapes_in_response_to() {
        let xml = build_logout_response_xml(&config(), "http://idp/slo", "\"><evil/>", false);
        assert!(!xml.contains("<evil/>"));
        assert!(xml.contains(STATUS_RESPONDER));
    }
}
