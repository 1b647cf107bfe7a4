// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Secrets (OAuth client secret, the fixed backend bearer tokens, signing
//! keys) are read once at startup and held in memory. They are never sent
//! to the browser; see the route handler layer.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Frontend URL for redirects after sign-in / sign-out
    pub frontend_url: String,
    /// Platform backend base URL (no trailing slash)
    pub backend_url: String,
    /// Platform backend websocket URL for the push channel
    pub backend_ws_url: String,
    /// Required email domain suffix, e.g. "@school.edu"
    pub allowed_email_domain: String,
    /// Host suffix that marks a serverless backend deployment (poll mode)
    pub serverless_host_suffix: String,
    /// Poll-mode invalidation interval in seconds
    pub poll_interval_secs: u64,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Fixed bearer token for admin-tier backend calls
    pub admin_api_token: String,
    /// Fixed bearer token for user-tier backend calls
    pub user_api_token: String,
    /// Fixed bearer token for the sign-in identity exchange
    pub auth_api_token: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let backend_url = env::var("BACKEND_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .map_err(|_| ConfigError::Missing("BACKEND_URL"))?;

        // Push channel defaults to the backend host with a ws scheme
        let backend_ws_url = env::var("BACKEND_WS_URL").unwrap_or_else(|_| {
            backend_url
                .replacen("https://", "wss://", 1)
                .replacen("http://", "ws://", 1)
        });

        Ok(Self {
            google_client_id: env::var("AUTH_GOOGLE_ID")
                .map_err(|_| ConfigError::Missing("AUTH_GOOGLE_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            backend_url,
            backend_ws_url,
            allowed_email_domain: env::var("AUTH_EMAIL_DOMAIN")
                .map_err(|_| ConfigError::Missing("AUTH_EMAIL_DOMAIN"))?,
            serverless_host_suffix: env::var("SERVERLESS_HOST_SUFFIX")
                .unwrap_or_else(|_| "vercel.app".to_string()),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            google_client_secret: env::var("AUTH_GOOGLE_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_GOOGLE_SECRET"))?,
            admin_api_token: env::var("ADMIN_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("ADMIN_TOKEN"))?,
            user_api_token: env::var("USER_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("USER_TOKEN"))?,
            auth_api_token: env::var("AUTH_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_TOKEN"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
        })
    }

    /// Default config for tests. Never used in production paths.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            backend_url: "http://localhost:9090".to_string(),
            backend_ws_url: "ws://localhost:9090".to_string(),
            allowed_email_domain: "@school.edu".to_string(),
            serverless_host_suffix: "vercel.app".to_string(),
            poll_interval_secs: 30,
            port: 8080,
            google_client_secret: "test_secret".to_string(),
            admin_api_token: "test_admin_token".to_string(),
            user_api_token: "test_user_token".to_string(),
            auth_api_token: "test_auth_token".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
