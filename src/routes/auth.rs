// SPDX-License-Identifier: MIT

//! Sign-in routes: OAuth redirect flow, one-tap credential flow, sign-out.
//!
//! Both entry paths converge on `IdentityService::exchange_identity`, so
//! the email-domain restriction and fail-closed backend exchange hold no
//! matter how the user arrived. Denials redirect to the frontend error
//! page with a `DenialCode` the page dispatches on.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, DenialCode, Result};
use crate::middleware::session::{create_session_token, SESSION_COOKIE};
use crate::routes::api::SessionResponse;
use crate::AppState;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signin", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/credential", post(auth_credential))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after sign-in completes.
    /// If not provided, uses the configured frontend URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start the OAuth flow - redirect to Google authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    // Encode frontend URL + timestamp in state
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // Create the data payload: "frontend_url|timestamp_hex"
    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    // Sign the payload
    let mut mac = HmacSha256::new_from_slice(&state.config.oauth_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    // Combine payload + signature: "payload|signature_hex"
    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));

    // Base64 encode the whole thing for the URL
    let oauth_state = URL_SAFE_NO_PAD.encode(signed_state.as_bytes());

    let callback_url = callback_url_from_headers(&headers);
    let auth_url = state.identity.authorize_url(&callback_url, &oauth_state);

    tracing::info!(frontend_url = %frontend_url, "Starting OAuth flow, redirecting to Google");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code, run the identity exchange, mint the
/// session cookie.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    // Decode and verify frontend URL from state parameter
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid or tampered state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    // Check for OAuth errors from the provider
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let code = classify_provider_error(&error);
        return (jar, denial_redirect(&frontend_url, code));
    }

    let Some(code) = params.code else {
        return (jar, denial_redirect(&frontend_url, DenialCode::Default));
    };

    let callback_url = callback_url_from_headers(&headers);

    let signed_in = sign_in_with_code(&state, &code, &callback_url).await;

    match signed_in {
        Ok(token) => {
            let redirect_url = format!("{}/dashboard", frontend_url);
            (
                jar.add(session_cookie(token)),
                Redirect::temporary(&redirect_url),
            )
        }
        Err(err) => {
            let code = denial_code_for(&err);
            tracing::warn!(error = %err, code = %code, "Sign-in failed");
            (jar, denial_redirect(&frontend_url, code))
        }
    }
}

/// Full redirect-flow sign-in: code exchange, identity exchange, token mint.
async fn sign_in_with_code(
    state: &Arc<AppState>,
    code: &str,
    callback_url: &str,
) -> Result<String> {
    let assertion = state.identity.exchange_code(code, callback_url).await?;
    let user = state.identity.exchange_identity(&assertion).await?;

    create_session_token(&user, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Session token creation failed: {}", e)))
}

#[derive(Deserialize)]
pub struct CredentialParams {
    credential: String,
}

/// One-tap credential sign-in. The browser posts the Google-signed ID token
/// directly; the same domain check and backend exchange apply.
async fn auth_credential(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(params): Json<CredentialParams>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let assertion = state.identity.verify_credential(&params.credential).await?;
    let user = state.identity.exchange_identity(&assertion).await?;

    let token = create_session_token(&user, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Session token creation failed: {}", e)))?;

    let session = SessionResponse::from_backend_user(&user);

    Ok((jar.add(session_cookie(token)), Json(session)))
}

/// Sign out - clear the session cookie and send the user back.
///
/// Invalidation is synchronous from the caller's perspective; the identity
/// provider's own logout is not involved.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let redirect = format!("{}/signin", state.config.frontend_url);
    (
        jar.remove(Cookie::from(SESSION_COOKIE)),
        Redirect::temporary(&redirect),
    )
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Map a sign-in pipeline error onto the frontend's denial codes.
fn denial_code_for(err: &AppError) -> DenialCode {
    match err {
        AppError::SignInDenied(code) => *code,
        // Backend exchange failure is indistinguishable from denial for the
        // user; the session simply is not issued.
        AppError::BackendApi { .. } | AppError::BackendUnavailable(_) => DenialCode::Default,
        _ => DenialCode::Default,
    }
}

/// Map provider-reported OAuth errors onto denial codes.
fn classify_provider_error(error: &str) -> DenialCode {
    match error {
        "access_denied" => DenialCode::AccessDenied,
        "invalid_client" | "unauthorized_client" | "invalid_request" => DenialCode::Configuration,
        _ => DenialCode::Default,
    }
}

fn denial_redirect(frontend_url: &str, code: DenialCode) -> Redirect {
    Redirect::temporary(&format!("{}/error?error={}", frontend_url, code))
}

/// Derive this gateway's callback URL from the request Host header.
fn callback_url_from_headers(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/callback", scheme, host)
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    // Reconstruct payload and verify signature
    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}
