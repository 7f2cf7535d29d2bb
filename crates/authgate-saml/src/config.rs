//! Service-provider configuration consumed by the protocol services.
//!
//! Environment loading lives in the server binary; this crate only
//! sees the resolved values.

use crate::error::{SsoError, SsoResult};

/// Signature algorithm for signed AuthnRequests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl SignatureAlgorithm {
    /// Parse the configured algorithm name; unknown names are a
    /// configuration error, not a silent fallback.
    pub fn parse(s: &str) -> SsoResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(SsoError::Configuration(format!(
                "Unsupported signature algorithm: {other}"
            ))),
        }
    }
}

/// Resolved SAML SP configuration.
#[derive(Debug, Clone)]
pub struct SamlConfig {
    /// SP issuer / entity ID presented to the IdP.
    pub sp_entity_id: String,
    /// Assertion Consumer Service URL (the `/sso` callback).
    pub acs_url: String,
    /// Single Logout callback URL (the `/slo` callback).
    pub slo_url: String,
    /// IdP single sign-on entry point.
    pub idp_sso_url: String,
    /// IdP single logout endpoint; logout falls back to a local-only
    /// logout when unset.
    pub idp_slo_url: Option<String>,
    /// IdP entity ID used when constructing IdP metadata for validation.
    pub idp_entity_id: String,
    /// Expected audience restriction, when enforced.
    pub audience: Option<String>,
    /// IdP signing certificate (PEM). Without it the validator rejects
    /// every assertion.
    pub idp_certificate: Option<String>,
    /// SP private key (PEM) for signing AuthnRequests/LogoutRequests.
    pub sp_private_key: Option<String>,
    /// SP certificate (PEM) published in metadata.
    pub sp_certificate: Option<String>,
    /// Algorithm for redirect-binding signatures.
    pub signature_algorithm: SignatureAlgorithm,
}

impl SamlConfig {
    /// Validate the invariants metadata generation depends on.
    pub fn validate(&self) -> SsoResult<()> {
        if self.sp_entity_id.is_empty() {
            return Err(SsoError::Configuration("SP issuer is empty".to_string()));
        }
        if self.acs_url.is_empty() {
            return Err(SsoError::Configuration("SP ACS URL is empty".to_string()));
        }
        if self.sp_private_key.is_some() && self.sp_certificate.is_none() {
            tracing::warn!("SP key configured without certificate; metadata will omit KeyInfo");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_empty_issuer_rejected() {
        let mut c = config();
        c.sp_entity_id = String::new();
        assert!(matches!(c.validate(), Err(SsoError::Configuration(_))));
    }

    #[test]
    fn test_empty_acs_rejected() {
        let mut c = config();
        c.acs_url = String::new();
        assert!(matches!(c.validate(), Err(SsoError::Configuration(_))));
    }

    #[test]
    fn test_signature_algorithm_parse() {
        assert_eq!(
            SignatureAlgorithm::parse("sha256").unwrap(),
            SignatureAlgorithm::Sha256
        );
        assert_eq!(
            SignatureAlgorithm::parse("SHA512").unwrap(),
            SignatureAlgorithm::Sha512
        );
        assert!(SignatureAlgorithm::parse("md5").is_err());
    }
}
