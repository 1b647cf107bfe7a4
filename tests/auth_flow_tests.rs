// SPDX-License-Identifier: MIT

//! OAuth redirect flow tests: the sign-in redirect, the signed state
//! parameter round trip, provider error classification, and sign-out.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;
use wiremock::MockServer;

mod common;

fn location(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_signin_redirects_to_google() {
    let backend = MockServer::start().await;
    let (app, _) = common::create_test_app(&backend.uri());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/signin")
                .header(header::HOST, "gw.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = location(&response);
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
    assert!(location.contains("client_id=test_client_id"));
    assert!(location.contains("state="));
    assert!(location.contains("response_type=code"));
}

#[tokio::test]
async fn test_state_round_trips_through_callback() {
    let backend = MockServer::start().await;
    let (app, _) = common::create_test_app(&backend.uri());

    // Start the flow with a custom frontend target
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/signin?redirect_uri=https://staging.example.com")
                .header(header::HOST, "gw.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let auth_url = location(&response);
    let state = auth_url
        .split("state=")
        .nth(1)
        .unwrap()
        .split('&')
        .next()
        .unwrap()
        .to_string();

    // The provider denies; the callback must bounce to the frontend URL
    // carried (and authenticated) by the state parameter
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/auth/callback?error=access_denied&state={}", state))
                .header(header::HOST, "gw.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "https://staging.example.com/error?error=AccessDenied"
    );
}

#[tokio::test]
async fn test_tampered_state_falls_back_to_configured_frontend() {
    let backend = MockServer::start().await;
    let (app, _) = common::create_test_app(&backend.uri());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/callback?error=access_denied&state=bm90LXZhbGlk")
                .header(header::HOST, "gw.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "http://localhost:3000/error?error=AccessDenied"
    );
}

#[tokio::test]
async fn test_callback_without_code_is_a_default_denial() {
    let backend = MockServer::start().await;
    let (app, _) = common::create_test_app(&backend.uri());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/callback")
                .header(header::HOST, "gw.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "http://localhost:3000/error?error=Default"
    );
}

#[tokio::test]
async fn test_provider_config_error_is_classified() {
    let backend = MockServer::start().await;
    let (app, _) = common::create_test_app(&backend.uri());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/callback?error=invalid_client")
                .header(header::HOST, "gw.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "http://localhost:3000/error?error=Configuration"
    );
}

#[tokio::test]
async fn test_logout_clears_session_and_redirects() {
    let backend = MockServer::start().await;
    let (app, _) = common::create_test_app(&backend.uri());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:3000/signin");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("removal cookie missing")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("quakewatch_session="));
    assert!(cookie.contains("Max-Age=0") || cookie.contains("expires"));
}
