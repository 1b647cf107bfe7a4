// SPDX-License-Identifier: MIT

//! Backend relay tests for the protected API routes.
//!
//! The handlers are thin authorizing relays: they pick a credential tier,
//! forward one call, and pass backend statuses through unchanged. Requests
//! denied locally (validation, role checks) must never reach the backend.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use quakewatch_gateway::models::Role;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{
    body_json, header as header_match, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn user_envelope() -> serde_json::Value {
    json!({
        "message": "ok",
        "statusCode": 200,
        "data": {
            "id": "u1",
            "name": "Alice",
            "email": "alice@school.edu",
            "role": "user",
            "alertNotification": true,
            "smsNotification": false,
            "phoneNumber": "+639171234567",
            "oauthId": "google-sub-1"
        }
    })
}

#[tokio::test]
async fn test_readings_requires_a_date_bound() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/api/readings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app.oneshot(get("/api/readings", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_readings_relayed_with_admin_tier() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/api/readings"))
        .and(header_match("Token-Type", "admin"))
        .and(header_match("authorization", "Bearer test_admin_token"))
        .and(query_param("startDate", "2026-08-01"))
        .and(query_param("platform", "web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "r1",
                "createdAt": "2026-08-01T00:00:00Z",
                "siAverage": 0.4,
                "siMaximum": 1.2,
                "siMinimum": 0.1
            }],
            "batteryLevel": 88.0
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app
        .oneshot(get("/api/readings?startDate=2026-08-01", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"][0]["id"], "r1");
    assert_eq!(json["batteryLevel"], 88.0);
}

#[tokio::test]
async fn test_backend_status_passes_through() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/api/earthquakes"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "message": "sensor offline" })),
        )
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app.oneshot(get("/api/earthquakes", &token)).await.unwrap();

    // Status and the backend's own message are relayed, not remapped
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "sensor offline");
}

#[tokio::test]
async fn test_user_list_requires_admin_role() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app.oneshot(get("/api/users", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_update_requires_admin_before_backend_call() {
    let backend = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/api/users/u2/role"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_envelope()))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/api/users/u2/role",
            &token,
            json!({ "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_update_without_session_never_reaches_backend() {
    let backend = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/api/users/u2/role"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_envelope()))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());

    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/users/u2/role")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "role": "admin" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_update_requires_role_field() {
    let backend = MockServer::start().await;
    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::Admin);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/api/users/u2/role",
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["details"], "Role is required");
}

#[tokio::test]
async fn test_role_update_relayed_for_admin() {
    let backend = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/api/users/u2/role"))
        .and(header_match("Token-Type", "admin"))
        .and(body_json(json!({ "role": "admin" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_envelope()))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::Admin);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/api/users/u2/role",
            &token,
            json!({ "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_phone_number_gets_country_prefix() {
    let backend = MockServer::start().await;

    // The session subject scopes the update; the number gains the +63 prefix
    Mock::given(method("PATCH"))
        .and(path("/v1/api/users/u1/phone-number"))
        .and(header_match("Token-Type", "user"))
        .and(body_json(json!({ "phoneNumber": "+639171234567" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_envelope()))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/api/phone-number",
            &token,
            json!({ "phoneNumber": "9171234567" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_phone_number_clears_stored_number() {
    let backend = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/api/users/u1/phone-number"))
        .and(body_json(json!({ "phoneNumber": "" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_envelope()))
        .expect(1)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/api/phone-number",
            &token,
            json!({ "phoneNumber": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_push_subscribe_requires_subscription() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/api/push-notifications/subscribe"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/push-subscribe",
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_iot_reset_admin_only() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/api/iot/device/reset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "rebooting" })))
        .expect(0)
        .mount(&backend)
        .await;

    let (app, _) = common::create_test_app(&backend.uri());
    let token = common::session_token(Role::User);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/iot/reset")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
