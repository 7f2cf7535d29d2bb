//! `OpenAPI` documentation and Swagger UI configuration.
//!
//! Aggregates the annotated broker endpoints into a single document
//! served alongside the application routes.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// `OpenAPI` documentation for the broker.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Authgate API",
        version = "0.1.0",
        description = "SAML 2.0 SSO assertion broker"
    ),
    servers(
        (url = "http://localhost:3000", description = "Development server")
    ),
    tags(
        (name = "SSO", description = "Login, assertion consumption, identity polling, logout")
    ),
    paths(
        authgate_saml::handlers::login::get_home,
        authgate_saml::handlers::login::get_login,
        authgate_saml::handlers::login::get_login_failed,
        authgate_saml::handlers::metadata::get_metadata,
        authgate_saml::handlers::sso::consume_assertion,
        authgate_saml::handlers::details::get_details,
        authgate_saml::handlers::details::get_data,
        authgate_saml::handlers::logout::get_logout,
        authgate_saml::handlers::logout::slo_post,
    ),
    components(schemas(
        authgate_saml::handlers::sso::SsoResponseForm,
        authgate_saml::handlers::logout::SloForm,
        authgate_saml::IdentityRecord,
        authgate_saml::IdentityResponse,
    ))
)]
pub struct ApiDoc;

/// Create Swagger UI routes.
pub fn swagger_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
}
