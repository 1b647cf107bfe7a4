// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Sign-in denial categories, mirrored by the frontend error page.
///
/// The string form of each variant is the `error` query parameter the
/// frontend dispatches on when rendering denial guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialCode {
    /// Email domain mismatch or missing profile.
    AccessDenied,
    /// The identity token or email address could not be verified.
    Verification,
    /// The identity provider is misconfigured.
    Configuration,
    /// Anything else.
    Default,
}

impl DenialCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialCode::AccessDenied => "AccessDenied",
            DenialCode::Verification => "Verification",
            DenialCode::Configuration => "Configuration",
            DenialCode::Default => "Default",
        }
    }
}

impl std::fmt::Display for DenialCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin role required")]
    Forbidden,

    #[error("Sign-in denied: {0}")]
    SignInDenied(DenialCode),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Backend non-2xx relayed with its original status code.
    #[error("Backend API error ({status}): {message}")]
    BackendApi { status: u16, message: String },

    /// Backend unreachable or response unparseable.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string(), None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token".to_string(), None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string(), None),
            AppError::SignInDenied(code) => (
                StatusCode::UNAUTHORIZED,
                "sign_in_denied".to_string(),
                Some(code.to_string()),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "not_found".to_string(),
                Some(msg.clone()),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request".to_string(),
                Some(msg.clone()),
            ),
            AppError::BackendApi { status, message } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                message.clone(),
                None,
            ),
            AppError::BackendUnavailable(msg) => {
                tracing::error!(error = %msg, "Backend unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "backend_unavailable".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse { error, details };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
