//! Integration tests for SP- and IdP-initiated logout.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tower::ServiceExt;

mod common;
use common::{create_test_state, form_body, test_app, test_record, StubValidator};

/// Unauthenticated `/logout` bounces home and must not touch the cache.
#[tokio::test]
async fn test_logout_unauthenticated_leaves_cache_alone() {
    let state = create_test_state(Arc::new(StubValidator::accepting(test_record())));
    let cache = state.cache.clone();
    cache.put("jackson@example.com", test_record()).await;
    let app = test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION].to_str().unwrap(), "/");
    assert!(cache.get("jackson@example.com").await.is_some());
}

/// Authenticated logout evicts the cache entry, drops the session, and
/// redirects to the IdP SLO endpoint with a LogoutRequest.
#[tokio::test]
async fn test_logout_evicts_and_redirects_to_idp() {
    let state = create_test_state(Arc::new(StubValidator::accepting(test_record())));
    let cache = state.cache.clone();
    let sessions = state.sessions.clone();

    cache.put("jackson@example.com", test_record()).await;
    let session_id = sessions.create(test_record()).await;
    let app = test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/logout")
                .header(header::COOKIE, format!("authgate_session={session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("http://localhost:7000/saml/slo"));
    assert!(location.contains("SAMLRequest="));

    assert!(cache.get("jackson@example.com").await.is_none());
    assert!(sessions.get(session_id).await.is_none());
}

fn logout_request_xml(issuer: &str, session_index: Option<&str>) -> String {
    let session_index_element = session_index
        .map(|si| format!("<samlp:SessionIndex>{si}</samlp:SessionIndex>"))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    ID="_lr_idp1" Version="2.0" IssueInstant="2026-02-21T10:00:00Z">
    <saml:Issuer>{issuer}</saml:Issuer>
    <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">jackson@example.com</saml:NameID>
    {session_index_element}
</samlp:LogoutRequest>"#
    )
}

/// IdP-initiated logout correlates by session index and evicts both the
/// browser session and the cache entry.
#[tokio::test]
async fn test_idp_initiated_logout_evicts_by_session_index() {
    let state = create_test_state(Arc::new(StubValidator::accepting(test_record())));
    let cache = state.cache.clone();
    let sessions = state.sessions.clone();

    cache.put("jackson@example.com", test_record()).await;
    let session_id = sessions.create(test_record()).await;
    let app = test_app(state);

    let encoded = STANDARD.encode(logout_request_xml("urn:example:idp", Some("_abc123")));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slo")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_body("SAMLRequest", &encoded)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("http://localhost:7000/saml/slo"));
    assert!(location.contains("SAMLResponse="));

    assert!(cache.get("jackson@example.com").await.is_none());
    assert!(sessions.get(session_id).await.is_none());
}

/// A LogoutRequest from an unexpected issuer is rejected without
/// evicting anything.
#[tokio::test]
async fn test_idp_initiated_logout_wrong_issuer_rejected() {
    let state = create_test_state(Arc::new(StubValidator::accepting(test_record())));
    let cache = state.cache.clone();
    cache.put("jackson@example.com", test_record()).await;
    let app = test_app(state);

    let encoded = STANDARD.encode(logout_request_xml("urn:evil:idp", Some("_abc123")));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slo")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_body("SAMLRequest", &encoded)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION].to_str().unwrap(),
        "/login_failed"
    );
    assert!(cache.get("jackson@example.com").await.is_some());
}

/// Without a session index the request proves nothing; no eviction.
#[tokio::test]
async fn test_idp_initiated_logout_without_session_index_evicts_nothing() {
    let state = create_test_state(Arc::new(StubValidator::accepting(test_record())));
    let cache = state.cache.clone();
    let sessions = state.sessions.clone();

    cache.put("jackson@example.com", test_record()).await;
    sessions.create(test_record()).await;
    let app = test_app(state);

    let encoded = STANDARD.encode(logout_request_xml("urn:example:idp", None));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slo")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_body("SAMLRequest", &encoded)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(cache.get("jackson@example.com").await.is_some());
    assert_eq!(sessions.len().await, 1);
}

/// The IdP's answer to our own LogoutRequest closes the exchange with a
/// redirect home.
#[tokio::test]
async fn test_logout_response_completion_redirects_home() {
    let state = create_test_state(Arc::new(StubValidator::accepting(test_record())));
    let app = test_app(state);

    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    ID="_lresp1" Version="2.0" InResponseTo="_logout_1">
    <samlp:Status>
        <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>
    </samlp:Status>
</samlp:LogoutResponse>"#;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slo")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_body("SAMLResponse", &STANDARD.encode(xml))))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION].to_str().unwrap(), "/");
}

/// An empty SLO post carries neither message and fails.
#[tokio::test]
async fn test_slo_without_message_is_rejected() {
    let state = create_test_state(Arc::new(StubValidator::accepting(test_record())));
    let app = test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slo")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(""))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION].to_str().unwrap(),
        "/login_failed"
    );
}
