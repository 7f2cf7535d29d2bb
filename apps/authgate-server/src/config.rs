//! Application configuration loaded from environment variables.
//!
//! Every variable has a development default; the server fails fast with
//! a clear message when a provided value cannot be used.

use authgate_saml::{SamlConfig, SignatureAlgorithm};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {variable} file '{path}': {source}")]
    FileRead {
        variable: &'static str,
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid value for {variable}: {message}")]
    InvalidValue {
        variable: &'static str,
        message: String,
    },
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub saml: SamlConfig,
    pub cache_write_expiry_secs: i64,
    pub cache_read_expiry_secs: i64,
    pub cache_sweep_interval_secs: u64,
    pub ledger_ttl_secs: i64,
    pub log_filter: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an injectable variable lookup, so
    /// tests stay independent of the process environment.
    fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| get(name).filter(|s| !s.is_empty());
        let var_or = |name: &str, default: &str| {
            var(name).unwrap_or_else(|| default.to_string())
        };

        let signature_algorithm = match var("SP_KEY_ALGO") {
            Some(value) => {
                SignatureAlgorithm::parse(&value).map_err(|e| ConfigError::InvalidValue {
                    variable: "SP_KEY_ALGO",
                    message: e.to_string(),
                })?
            }
            None => SignatureAlgorithm::default(),
        };

        let saml = SamlConfig {
            sp_entity_id: var_or("SAML_SP_ISSUER", "urn:example:sp"),
            acs_url: var_or("SAML_SP_SSO_URL", "http://localhost:3000/sso"),
            slo_url: var_or("SAML_SP_SLO_URL", "http://localhost:3000/slo"),
            idp_sso_url: var_or("SAML_IDP_SSO_URL", "http://localhost:7000/saml/sso"),
            idp_slo_url: Some(var_or("SAML_IDP_SLO_URL", "http://localhost:7000/saml/slo")),
            idp_entity_id: var_or("SAML_IDP_ISSUER", "urn:example:idp"),
            audience: var("SP_AUDIENCE"),
            idp_certificate: read_pem_file("IDP_CERT_FILE", var("IDP_CERT_FILE"))?,
            sp_private_key: read_pem_file("SP_KEY_FILE", var("SP_KEY_FILE"))?,
            sp_certificate: read_pem_file("SP_CERT_FILE", var("SP_CERT_FILE"))?,
            signature_algorithm,
        };

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parsed(var("PORT"), 3000),
            saml,
            cache_write_expiry_secs: parsed(var("CACHE_WRITE_EXPIRY_SECS"), 3600),
            cache_read_expiry_secs: parsed(var("CACHE_READ_EXPIRY_SECS"), 300),
            cache_sweep_interval_secs: parsed(var("CACHE_SWEEP_INTERVAL_SECS"), 300),
            ledger_ttl_secs: parsed(var("LEDGER_TTL_SECS"), 300),
            log_filter: var_or("RUST_LOG", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Cookies are marked Secure when the SP endpoints are served over TLS.
    pub fn secure_cookies(&self) -> bool {
        self.saml.acs_url.starts_with("https://")
    }
}

fn parsed<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn read_pem_file(
    variable: &'static str,
    path: Option<String>,
) -> Result<Option<String>, ConfigError> {
    match path {
        Some(path) => std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| ConfigError::FileRead {
                variable,
                path,
                source,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_write_expiry_secs, 3600);
        assert_eq!(config.cache_read_expiry_secs, 300);
        assert_eq!(config.ledger_ttl_secs, 300);
        assert_eq!(config.saml.sp_entity_id, "urn:example:sp");
        assert_eq!(config.log_filter, "info");
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8443"),
            ("SAML_SP_SSO_URL", "https://sp.example.com/sso"),
            ("SAML_SP_ISSUER", "urn:prod:sp"),
            ("CACHE_READ_EXPIRY_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8443);
        assert_eq!(config.saml.sp_entity_id, "urn:prod:sp");
        assert_eq!(config.cache_read_expiry_secs, 60);
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_empty_value_falls_back_to_default() {
        let config = Config::from_lookup(lookup(&[("HOST", "")])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_signature_algorithm_rejected() {
        let result = Config::from_lookup(lookup(&[("SP_KEY_ALGO", "md5")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { variable: "SP_KEY_ALGO", .. })
        ));
    }
}
