//! Protocol services shared by the HTTP handlers.

pub mod client;
pub mod logout;
pub mod metadata;
pub mod validator;

pub use client::SamlClient;
pub use logout::{
    build_logout_response_redirect, extract_in_response_to, parse_logout_request,
    parse_logout_response, ParsedLogoutRequest, ParsedLogoutResponse,
};
pub use metadata::generate_sp_metadata;
pub use validator::{AssertionValidator, SamlAssertionValidator};
