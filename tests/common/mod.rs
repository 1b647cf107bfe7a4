// SPDX-License-Identifier: MIT

use quakewatch_gateway::config::Config;
use quakewatch_gateway::middleware::session::create_session_token;
use quakewatch_gateway::models::{BackendUser, Role};
use quakewatch_gateway::routes::create_router;
use quakewatch_gateway::services::{BackendClient, GoogleIdentityVerifier, IdentityService};
use quakewatch_gateway::sync::{EventCache, LiveSync};
use quakewatch_gateway::AppState;
use std::sync::Arc;

/// A canonical backend user record for tests.
#[allow(dead_code)]
pub fn backend_user(role: Role) -> BackendUser {
    BackendUser {
        id: "u1".to_string(),
        name: "Alice".to_string(),
        email: "alice@school.edu".to_string(),
        profile_image: Some("https://example.com/a.png".to_string()),
        role,
        alert_notification: true,
        sms_notification: false,
        phone_number: "+63917000000".to_string(),
        oauth_id: "google-sub-1".to_string(),
        created_at: None,
    }
}

/// Mint a session token for the canonical test user with the given role.
#[allow(dead_code)]
pub fn session_token(role: Role) -> String {
    let config = Config::test_default();
    create_session_token(&backend_user(role), &config.jwt_signing_key)
        .expect("session token mint failed")
}

/// Create a test app pointed at the given backend URL (normally a
/// wiremock server). Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(backend_url: &str) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.backend_url = backend_url.trim_end_matches('/').to_string();

    let verifier =
        Arc::new(GoogleIdentityVerifier::new(&config).expect("verifier init failed"));
    create_test_app_with_verifier(config, verifier)
}

/// Create a test app with an explicit identity verifier (static-key mode
/// for the sign-in pipeline tests).
#[allow(dead_code)]
pub fn create_test_app_with_verifier(
    config: Config,
    verifier: Arc<GoogleIdentityVerifier>,
) -> (axum::Router, Arc<AppState>) {
    let backend = BackendClient::new(&config);
    let identity = IdentityService::new(&config, backend.clone(), verifier);

    let cache = Arc::new(EventCache::new());
    let live = LiveSync::start(&config, cache.clone());

    let state = Arc::new(AppState {
        config,
        backend,
        identity,
        cache,
        live,
    });

    (create_router(state.clone()), state)
}
