// SPDX-License-Identifier: MIT

//! Session token middleware.
//!
//! The session is a signed JWT minted once at sign-in from the backend user
//! record. Its role and preference claims reflect that record as of the
//! last identity exchange; they are not re-validated mid-session. The
//! browser can read the session but never elevate it.

use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie set on sign-in.
pub const SESSION_COOKIE: &str = "quakewatch_session";

const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60; // 30 days

/// JWT claims structure for a session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (backend user ID)
    pub sub: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
    pub role: Role,
    pub alert_notification: bool,
    pub sms_notification: bool,
    pub phone_number: String,
    pub oauth_id: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated session extracted from a valid session token.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
    pub role: Role,
    pub alert_notification: bool,
    pub sms_notification: bool,
    pub phone_number: String,
    pub oauth_id: String,
}

impl From<SessionClaims> for SessionUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            picture: claims.picture,
            role: claims.role,
            alert_notification: claims.alert_notification,
            sms_notification: claims.sms_notification,
            phone_number: claims.phone_number,
            oauth_id: claims.oauth_id,
        }
    }
}

/// Middleware that requires a valid session token.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let claims = decode_session_token(&token, &state.config.jwt_signing_key)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(SessionUser::from(claims));

    Ok(next.run(request).await)
}

/// Decode and validate a session token.
pub fn decode_session_token(
    token: &str,
    signing_key: &[u8],
) -> jsonwebtoken::errors::Result<SessionClaims> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<SessionClaims>(token, &key, &validation).map(|data| data.claims)
}

/// Create a session token from the backend user record.
///
/// Claims copy the record verbatim; nothing is defaulted or merged.
pub fn create_session_token(
    user: &crate::models::BackendUser,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = SessionClaims {
        sub: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        picture: user.profile_image.clone(),
        role: user.role,
        alert_notification: user.alert_notification,
        sms_notification: user.sms_notification,
        phone_number: user.phone_number.clone(),
        oauth_id: user.oauth_id.clone(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Capability check for admin-tier handlers.
///
/// Role dispatch happens once per request against the session claim; the
/// backend call is never made for a non-admin session.
pub fn require_admin(user: &SessionUser) -> crate::error::Result<()> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(crate::error::AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendUser;

    fn test_user() -> BackendUser {
        BackendUser {
            id: "u1".to_string(),
            name: "Alice".to_string(),
            email: "alice@school.edu".to_string(),
            profile_image: Some("https://example.com/a.png".to_string()),
            role: Role::Admin,
            alert_notification: true,
            sms_notification: false,
            phone_number: "+63917000000".to_string(),
            oauth_id: "google-sub-1".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_session_token_round_trip() {
        let key = b"test_jwt_key_32_bytes_minimum!!!";
        let token = create_session_token(&test_user(), key).unwrap();
        let claims = decode_session_token(&token, key).unwrap();

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.alert_notification);
        assert_eq!(claims.oauth_id, "google-sub-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = create_session_token(&test_user(), b"key_one_32_bytes_long_enough!!!!").unwrap();
        assert!(decode_session_token(&token, b"key_two_32_bytes_long_enough!!!!").is_err());
    }

    #[test]
    fn test_require_admin_rejects_user_role() {
        let mut user: SessionUser = decode_session_token(
            &create_session_token(&test_user(), b"k".repeat(32).as_slice()).unwrap(),
            b"k".repeat(32).as_slice(),
        )
        .unwrap()
        .into();

        assert!(require_admin(&user).is_ok());
        user.role = Role::User;
        assert!(matches!(
            require_admin(&user),
            Err(crate::error::AppError::Forbidden)
        ));
    }
}
