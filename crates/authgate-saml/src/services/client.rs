//! SAML protocol client: AuthnRequest and LogoutRequest construction.
//!
//! Wraps the `samael` service-provider primitives. A fresh
//! `ServiceProvider` is built from configuration per operation; the
//! builder is cheap and this keeps the client free of interior state.

use crate::config::{SamlConfig, SignatureAlgorithm};
use crate::error::{SsoError, SsoResult};
use crate::session::IdentityRecord;
use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::{write::DeflateEncoder, Compression};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use samael::metadata::EntityDescriptor;
use samael::service_provider::{ServiceProvider, ServiceProviderBuilder};
use std::io::Write;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// NameID format requested from the IdP.
pub const NAMEID_FORMAT_EMAIL: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";

/// Protocol client bound to one IdP.
#[derive(Clone)]
pub struct SamlClient {
    config: Arc<SamlConfig>,
}

impl SamlClient {
    #[must_use]
    pub fn new(config: Arc<SamlConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamlConfig {
        &self.config
    }

    /// Build the IdP redirect for a new login attempt.
    ///
    /// Returns the redirect URL and the `AuthnRequest` ID the ledger must
    /// remember for `InResponseTo` correlation.
    pub fn login_redirect(&self, relay_state: &str) -> SsoResult<(Url, String)> {
        let sp = self.build_sp(false)?;

        let authn_request = sp
            .make_authentication_request(&self.config.idp_sso_url)
            .map_err(|e| SsoError::Configuration(format!("Failed to create AuthnRequest: {e}")))?;

        let request_id = authn_request.id.clone();

        let url = if self.config.sp_private_key.is_some() {
            let key_der = self
                .load_private_key()?
                .private_key_to_der()
                .map_err(|e| SsoError::Configuration(format!("Failed to encode SP key: {e}")))?;
            authn_request
                .signed_redirect(relay_state, &key_der)
                .map_err(|e| SsoError::Configuration(format!("Failed to sign AuthnRequest: {e}")))?
        } else {
            authn_request
                .redirect(relay_state)
                .map_err(|e| SsoError::Configuration(format!("Failed to encode AuthnRequest: {e}")))?
        }
        .ok_or_else(|| SsoError::Configuration("AuthnRequest has no destination".to_string()))?;

        tracing::debug!(
            request_id = %request_id,
            idp_sso_url = %self.config.idp_sso_url,
            signed = self.config.sp_private_key.is_some(),
            "AuthnRequest generated"
        );

        Ok((url, request_id))
    }

    /// Build the IdP redirect carrying a `LogoutRequest` for the given
    /// identity. Returns `None` when no IdP SLO endpoint is configured —
    /// logout then stays local.
    pub fn logout_redirect(
        &self,
        record: &IdentityRecord,
        relay_state: &str,
    ) -> SsoResult<Option<Url>> {
        let Some(idp_slo_url) = self.config.idp_slo_url.as_deref() else {
            return Ok(None);
        };

        let logout_request = self.build_logout_request(record, idp_slo_url);

        // HTTP-Redirect binding: DEFLATE, then base64, then query param
        let xml = logout_request
            .to_xml()
            .map_err(|e| SsoError::Internal(format!("Failed to serialize LogoutRequest: {e:?}")))?;

        let mut compressed = Vec::new();
        {
            let mut encoder = DeflateEncoder::new(&mut compressed, Compression::default());
            encoder
                .write_all(xml.as_bytes())
                .map_err(|e| SsoError::Internal(format!("Failed to compress LogoutRequest: {e}")))?;
        }
        let encoded = STANDARD.encode(&compressed);

        let mut url: Url = idp_slo_url
            .parse()
            .map_err(|e| SsoError::Configuration(format!("Invalid IdP SLO URL: {e}")))?;
        url.query_pairs_mut().append_pair("SAMLRequest", &encoded);
        if !relay_state.is_empty() {
            url.query_pairs_mut().append_pair("RelayState", relay_state);
        }

        let url = if self.config.sp_private_key.is_some() {
            self.sign_redirect_url(url)?
        } else {
            url
        };

        tracing::debug!(
            idp_slo_url = %idp_slo_url,
            name_id = %record.name_id,
            "LogoutRequest redirect generated"
        );

        Ok(Some(url))
    }

    /// Build a `ServiceProvider` configured for this deployment.
    ///
    /// `allow_idp_initiated` must be set when validating a response that
    /// carries no `InResponseTo`, or samael rejects it outright.
    pub(crate) fn build_sp(&self, allow_idp_initiated: bool) -> SsoResult<ServiceProvider> {
        let idp_metadata = self.build_idp_metadata()?;

        ServiceProviderBuilder::default()
            .entity_id(self.config.sp_entity_id.clone())
            .acs_url(self.config.acs_url.clone())
            .slo_url(self.config.slo_url.clone())
            .idp_metadata(idp_metadata)
            .authn_name_id_format(NAMEID_FORMAT_EMAIL.to_string())
            .allow_idp_initiated(allow_idp_initiated)
            .build()
            .map_err(|e| SsoError::Configuration(format!("Failed to build ServiceProvider: {e}")))
    }

    /// Construct a minimal IdP `EntityDescriptor` from configuration.
    fn build_idp_metadata(&self) -> SsoResult<EntityDescriptor> {
        let key_descriptor = self
            .config
            .idp_certificate
            .as_deref()
            .map(|cert| {
                format!(
                    r#"<md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                <ds:X509Data>
                    <ds:X509Certificate>{}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>"#,
                    strip_pem_headers(cert)
                )
            })
            .unwrap_or_default();

        let slo_service = self
            .config
            .idp_slo_url
            .as_deref()
            .map(|url| {
                format!(
                    r#"<md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{url}"/>"#
                )
            })
            .unwrap_or_default();

        let xml = format!(
            r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{}">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        {}
        <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{}"/>
        {}
    </md:IDPSSODescriptor>
</md:EntityDescriptor>"#,
            self.config.idp_entity_id, key_descriptor, self.config.idp_sso_url, slo_service
        );

        samael::metadata::de::from_str(&xml)
            .map_err(|e| SsoError::Configuration(format!("Failed to build IdP metadata: {e}")))
    }

    fn build_logout_request(
        &self,
        record: &IdentityRecord,
        destination: &str,
    ) -> samael::schema::LogoutRequest {
        use samael::schema::{Issuer, LogoutRequest, NameID};

        let name_id_format = record
            .name_id_format
            .clone()
            .unwrap_or_else(|| NAMEID_FORMAT_EMAIL.to_string());

        LogoutRequest {
            id: Some(format!("_logout_{}", Uuid::new_v4())),
            version: Some("2.0".to_string()),
            issue_instant: Some(chrono::Utc::now()),
            destination: Some(destination.to_string()),
            issuer: Some(Issuer {
                value: Some(self.config.sp_entity_id.clone()),
                ..Default::default()
            }),
            name_id: Some(NameID {
                value: record.name_id.clone(),
                format: Some(name_id_format),
            }),
            session_index: record.session_index.clone(),
            signature: None,
        }
    }

    pub(crate) fn load_private_key(&self) -> SsoResult<PKey<Private>> {
        let pem = self.config.sp_private_key.as_deref().ok_or_else(|| {
            SsoError::Configuration("Request signing requires SP_KEY_FILE".to_string())
        })?;

        PKey::private_key_from_pem(pem.as_bytes())
            .map_err(|e| SsoError::Configuration(format!("Failed to parse SP private key: {e}")))
    }

    /// Sign a redirect URL per SAML 2.0 bindings 3.4.4.1: the signature
    /// covers `SAMLRequest=..&RelayState=..&SigAlg=..` as encoded.
    fn sign_redirect_url(&self, mut url: Url) -> SsoResult<Url> {
        let private_key = self.load_private_key()?;

        let (sig_alg_uri, digest) = match self.config.signature_algorithm {
            SignatureAlgorithm::Sha1 => (
                "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
                MessageDigest::sha1(),
            ),
            SignatureAlgorithm::Sha256 => (
                "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
                MessageDigest::sha256(),
            ),
            SignatureAlgorithm::Sha512 => (
                "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
                MessageDigest::sha512(),
            ),
        };

        // SigAlg must be part of the signed content
        url.query_pairs_mut().append_pair("SigAlg", sig_alg_uri);

        let query = url
            .query()
            .ok_or_else(|| SsoError::Internal("No query string to sign".to_string()))?
            .to_string();

        let mut signer = Signer::new(digest, &private_key)
            .map_err(|e| SsoError::Internal(format!("Failed to create signer: {e}")))?;
        signer
            .update(query.as_bytes())
            .map_err(|e| SsoError::Internal(format!("Failed to update signer: {e}")))?;
        let signature = signer
            .sign_to_vec()
            .map_err(|e| SsoError::Internal(format!("Failed to sign: {e}")))?;

        url.query_pairs_mut()
            .append_pair("Signature", &STANDARD.encode(&signature));

        Ok(url)
    }
}

/// Strip PEM armor lines, leaving base64 content only.
pub(crate) fn strip_pem_headers(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----BEGIN") && !line.starts_with("-----END"))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignatureAlgorithm;

    fn config() -> Arc<SamlConfig> {
        Arc::new(SamlConfig {
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
        })
    }

    fn record() -> IdentityRecord {
        IdentityRecord {
            name_id: "jackson@example.com".to_string(),
            name_id_format: Some(NAMEID_FORMAT_EMAIL.to_string()),
            session_index: Some("_abc123".to_string()),
        }
    }

    #[test]
    fn test_login_redirect_targets_idp() {
        let client = SamlClient::new(config());
        let (url, request_id) = client.login_redirect("/").unwrap();

        assert!(url.as_str().starts_with("http://localhost:7000/saml/sso"));
        assert!(url.query().unwrap().contains("SAMLRequest="));
        assert!(!request_id.is_empty());
    }

    #[test]
    fn test_logout_redirect_carries_request() {
        let client = SamlClient::new(config());
        let url = client.logout_redirect(&record(), "/").unwrap().unwrap();

        assert!(url.as_str().starts_with("http://localhost:7000/saml/slo"));
        assert!(url.query().unwrap().contains("SAMLRequest="));
    }

    fn config_with_key() -> Arc<SamlConfig> {
        let rsa = openssl::rsa::Rsa::generate(2048).unwrap();
        let key = PKey::from_rsa(rsa).unwrap();
        let pem = String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap();

        let mut c = (*config()).clone();
        c.sp_private_key = Some(pem);
        Arc::new(c)
    }

    #[test]
    fn test_login_redirect_signed_when_key_configured() {
        let client = SamlClient::new(config_with_key());
        let (url, _) = client.login_redirect("/").unwrap();

        let query = url.query().unwrap();
        assert!(query.contains("SAMLRequest="));
        assert!(query.contains("SigAlg="));
        assert!(query.contains("Signature="));
    }

    #[test]
    fn test_logout_redirect_signed_when_key_configured() {
        let client = SamlClient::new(config_with_key());
        let url = client.logout_redirect(&record(), "/").unwrap().unwrap();

        let query = url.query().unwrap();
        assert!(query.contains("SAMLRequest="));
        assert!(query.contains("rsa-sha256"));
        assert!(query.contains("Signature="));
    }

    #[test]
    fn test_build_sp_idp_initiated_flag() {
        let client = SamlClient::new(config());

        assert!(client.build_sp(true).unwrap().allow_idp_initiated);
        assert!(!client.build_sp(false).unwrap().allow_idp_initiated);
    }

    #[test]
    fn test_logout_redirect_without_slo_endpoint() {
        let mut c = (*config()).clone();
        c.idp_slo_url = None;
        let client = SamlClient::new(Arc::new(c));

        assert!(client.logout_redirect(&record(), "/").unwrap().is_none());
    }
}
