//! SAML 2.0 SSO assertion broker library
//!
//! This crate provides SP-side SAML 2.0 functionality including:
//! - SP-initiated login (`AuthnRequest` generation, redirect binding)
//! - Assertion consumption with `InResponseTo` replay protection
//! - A dual-expiry identity cache pollable by NameID
//! - SP- and IdP-initiated single logout
//! - Metadata publishing

pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod router;
pub mod services;
pub mod session;

pub use config::{SamlConfig, SignatureAlgorithm};
pub use error::{SsoError, SsoResult};
pub use handlers::metadata::SsoState;
pub use ledger::{InMemoryRequestLedger, PendingRequest, RequestLedger};
pub use router::sso_router;
pub use services::{AssertionValidator, SamlAssertionValidator, SamlClient};
pub use session::{BrowserSessions, Clock, IdentityCache, IdentityRecord, IdentityResponse, SystemClock};
