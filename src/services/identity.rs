// SPDX-License-Identifier: MIT

//! Google identity verification and the sign-in exchange.
//!
//! Two entry paths deliver an identity assertion: the redirect-based OAuth
//! code flow and the one-tap credential flow. Both end up in
//! [`IdentityService::exchange_identity`], so the domain restriction and the
//! backend exchange form a single authorization contract regardless of how
//! the user signed in.

use crate::config::Config;
use crate::error::{AppError, DenialCode};
use crate::models::BackendUser;
use crate::services::backend::{BackendClient, IdentityUpsert};
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Transient identity assertion extracted from a verified Google ID token.
///
/// Validated against the email-domain allow-list and then discarded; it is
/// never persisted by this layer.
#[derive(Debug, Clone)]
pub struct IdentityAssertion {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// ID-token verification error categories.
#[derive(Debug, Clone)]
pub enum VerifyError {
    /// The token itself is invalid, expired, or carries bad claims.
    Invalid(String),
    /// The provider infrastructure (discovery/JWKS) failed.
    Provider(String),
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct DiscoveryCacheEntry {
    jwks_uri: String,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google-issued OpenID Connect ID tokens.
///
/// Discovers and caches Google's JWKS keys; a static-key mode exists for
/// deterministic tests.
pub struct GoogleIdentityVerifier {
    http_client: reqwest::Client,
    expected_audience: String,
    mode: VerifierMode,
    discovery_cache: RwLock<Option<DiscoveryCacheEntry>>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl GoogleIdentityVerifier {
    /// Create a production verifier bound to the OAuth client ID audience.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building identity HTTP client")?;

        tracing::info!(
            audience = %config.google_client_id,
            "Initialized Google identity verifier"
        );

        Ok(Self {
            http_client,
            expected_audience: config.google_client_id.clone(),
            mode: VerifierMode::Google,
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a verifier with a static RSA public key for tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static verifier kid must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building identity HTTP client")?;

        Ok(Self {
            http_client,
            expected_audience: config.google_client_id.clone(),
            mode: VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a Google ID token and extract the identity assertion.
    pub async fn verify_id_token(&self, token: &str) -> Result<IdentityAssertion, VerifyError> {
        let header = decode_header(token)
            .map_err(|e| VerifyError::Invalid(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(VerifyError::Invalid(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Invalid("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<GoogleIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| VerifyError::Invalid(format!("JWT validation failed: {e}")))?;

        let claims = token_data.claims;

        validate_iat(claims.iat)?;

        match claims.email_verified {
            Some(true) => {}
            Some(false) => {
                return Err(VerifyError::Invalid(
                    "email_verified claim is false".to_string(),
                ));
            }
            None => {
                return Err(VerifyError::Invalid(
                    "email_verified claim is missing".to_string(),
                ));
            }
        }

        let email = claims
            .email
            .ok_or_else(|| VerifyError::Invalid("missing email claim".to_string()))?;

        Ok(IdentityAssertion {
            subject: claims.sub,
            name: claims.name.unwrap_or_else(|| email.clone()),
            email,
            picture: claims.picture,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, VerifyError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(VerifyError::Invalid(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            VerifierMode::Google => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(VerifyError::Invalid(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), VerifyError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        let jwks_uri = self.resolve_jwks_uri(force_refresh).await?;

        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| VerifyError::Provider(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VerifyError::Provider(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| VerifyError::Provider(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }

            if jwk.kid.trim().is_empty() {
                continue;
            }

            if let Some(alg) = &jwk.alg {
                if alg != "RS256" {
                    continue;
                }
            }

            if let Some(use_) = &jwk.use_ {
                if use_ != "sig" {
                    continue;
                }
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(VerifyError::Provider(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }

    async fn resolve_jwks_uri(&self, force_refresh: bool) -> Result<String, VerifyError> {
        if !force_refresh {
            let cache = self.discovery_cache.read().await;
            if let Some(entry) = cache
                .as_ref()
                .filter(|entry| entry.expires_at > Instant::now())
            {
                return Ok(entry.jwks_uri.clone());
            }
        }

        let cached_jwks_uri = self
            .discovery_cache
            .read()
            .await
            .as_ref()
            .map(|entry| entry.jwks_uri.clone());

        let response = self.http_client.get(DISCOVERY_URL).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => {
                let ttl = cache_ttl_from_headers(resp.headers(), DEFAULT_CACHE_TTL);
                let discovery: OpenIdConfig = resp
                    .json()
                    .await
                    .map_err(|e| VerifyError::Provider(format!("invalid discovery JSON: {e}")))?;

                *self.discovery_cache.write().await = Some(DiscoveryCacheEntry {
                    jwks_uri: discovery.jwks_uri.clone(),
                    expires_at: Instant::now() + ttl,
                });

                Ok(discovery.jwks_uri)
            }
            Ok(resp) => {
                tracing::warn!(
                    status = %resp.status(),
                    "OIDC discovery returned non-success status; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| DEFAULT_JWKS_URL.to_string()))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "OIDC discovery request failed; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| DEFAULT_JWKS_URL.to_string()))
            }
        }
    }
}

// ─── Sign-in Exchange ────────────────────────────────────────────

/// The sign-in pipeline shared by both entry paths.
#[derive(Clone)]
pub struct IdentityService {
    http: reqwest::Client,
    verifier: Arc<GoogleIdentityVerifier>,
    backend: BackendClient,
    client_id: String,
    client_secret: String,
    allowed_email_domain: String,
    token_endpoint: String,
}

impl IdentityService {
    pub fn new(
        config: &Config,
        backend: BackendClient,
        verifier: Arc<GoogleIdentityVerifier>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            verifier,
            backend,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            allowed_email_domain: config.allowed_email_domain.clone(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
        }
    }

    /// Build the Google authorization URL for the redirect flow.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope=openid%20email%20profile&\
             access_type=offline&\
             prompt=consent&\
             state={}",
            self.client_id,
            urlencoding::encode(redirect_uri),
            state
        )
    }

    /// Exchange an authorization code for a verified identity assertion.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<IdentityAssertion, AppError> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Google token endpoint unreachable");
                AppError::SignInDenied(DenialCode::Configuration)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Authorization code exchange failed");
            return Err(AppError::SignInDenied(DenialCode::Verification));
        }

        let tokens: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|_| AppError::SignInDenied(DenialCode::Configuration))?;

        self.verify_credential(&tokens.id_token).await
    }

    /// Verify a raw ID-token credential (the one-tap flow posts this
    /// directly) into an identity assertion.
    pub async fn verify_credential(&self, credential: &str) -> Result<IdentityAssertion, AppError> {
        self.verifier
            .verify_id_token(credential)
            .await
            .map_err(|e| match e {
                VerifyError::Invalid(msg) => {
                    tracing::warn!(reason = %msg, "Identity token rejected");
                    AppError::SignInDenied(DenialCode::Verification)
                }
                VerifyError::Provider(msg) => {
                    tracing::error!(reason = %msg, "Identity provider failure");
                    AppError::SignInDenied(DenialCode::Configuration)
                }
            })
    }

    /// Convert an identity assertion into the canonical backend user.
    ///
    /// The domain restriction runs first; a mismatched assertion is denied
    /// before any backend call. Exchange failures deny sign-in entirely, so
    /// no session is ever minted with a partial or default role.
    pub async fn exchange_identity(
        &self,
        assertion: &IdentityAssertion,
    ) -> Result<BackendUser, AppError> {
        if assertion.email.is_empty()
            || !assertion.email.ends_with(&self.allowed_email_domain)
        {
            tracing::warn!(email = %assertion.email, "Sign-in denied: email domain not allowed");
            return Err(AppError::SignInDenied(DenialCode::AccessDenied));
        }

        let upsert = IdentityUpsert {
            email: assertion.email.clone(),
            name: assertion.name.clone(),
            oauth_id: assertion.subject.clone(),
            profile_image: assertion.picture.clone(),
        };

        let user = self.backend.exchange_identity(&upsert).await?;

        tracing::info!(
            user_id = %user.id,
            role = ?user.role,
            "Identity exchange complete"
        );

        Ok(user)
    }

    #[cfg(test)]
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    #[allow(dead_code)]
    iss: String,
    #[allow(dead_code)]
    aud: String,
    sub: String,
    #[allow(dead_code)]
    exp: usize,
    iat: Option<usize>,
    #[allow(dead_code)]
    nbf: Option<usize>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn validate_iat(iat: Option<usize>) -> Result<(), VerifyError> {
    let now = now_unix_secs();

    let Some(iat) = iat else {
        return Err(VerifyError::Invalid("missing iat claim".to_string()));
    };

    if iat as u64 > now + CLOCK_SKEW_SECS {
        return Err(VerifyError::Invalid("iat claim is in the future".to_string()));
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(reqwest::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn validate_iat_rejects_future() {
        let future = (now_unix_secs() + 3600) as usize;
        assert!(matches!(
            validate_iat(Some(future)),
            Err(VerifyError::Invalid(_))
        ));
        assert!(validate_iat(None).is_err());
        assert!(validate_iat(Some(now_unix_secs() as usize)).is_ok());
    }

    #[tokio::test]
    async fn exchange_code_rejection_is_a_verification_denial() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/token"))
            .respond_with(
                wiremock::ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let config = Config::test_default();
        let backend = BackendClient::new(&config);
        let verifier = Arc::new(GoogleIdentityVerifier::new(&config).unwrap());
        let service = IdentityService::new(&config, backend, verifier)
            .with_token_endpoint(format!("{}/token", server.uri()));

        let err = service
            .exchange_code("stale-code", "https://gw.example.com/auth/callback")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::SignInDenied(DenialCode::Verification)
        ));
    }

    #[test]
    fn authorize_url_includes_client_and_state() {
        let config = Config::test_default();
        let backend = BackendClient::new(&config);
        let verifier = Arc::new(GoogleIdentityVerifier::new(&config).unwrap());
        let service = IdentityService::new(&config, backend, verifier);

        let url = service.authorize_url("https://gw.example.com/auth/callback", "signed-state");
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("state=signed-state"));
        assert!(url.contains("response_type=code"));
    }
}
