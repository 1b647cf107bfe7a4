// SPDX-License-Identifier: MIT

//! Platform backend API client.
//!
//! Every outbound call carries one of three fixed bearer tokens plus a
//! `Token-Type` header naming the credential tier. The tokens live only in
//! this process; the browser never sees them, so privilege decisions are
//! made here and in the route handlers, never client-side.
//!
//! Each operation is a single forward-and-relay call: no retries, backend
//! non-2xx statuses are preserved for the caller.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{BackendUser, EarthquakesSnapshot, Pagination, ReadingsSnapshot, Role};
use serde::Deserialize;

/// Credential tier for a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTier {
    /// Privileged operations: readings, user administration, device control.
    Admin,
    /// Self-scoped operations on the caller's own record.
    User,
    /// The sign-in identity exchange only.
    Auth,
}

impl TokenTier {
    fn header_value(&self) -> &'static str {
        match self {
            TokenTier::Admin => "admin",
            TokenTier::User => "user",
            TokenTier::Auth => "auth",
        }
    }
}

/// Identity payload sent to the backend on sign-in (upsert by oauthId).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUpsert {
    pub email: String,
    pub name: String,
    pub oauth_id: String,
    pub profile_image: Option<String>,
}

/// Standard backend response envelope: `{message, statusCode, data}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    message: Option<String>,
    data: T,
}

/// User list envelope with pagination metadata.
#[derive(Debug, Deserialize)]
struct UserListEnvelope {
    data: Vec<BackendUser>,
    pagination: Option<Pagination>,
}

/// Platform backend API client.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    admin_token: String,
    user_token: String,
    auth_token: String,
}

impl BackendClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/v1/api", config.backend_url),
            admin_token: config.admin_api_token.clone(),
            user_token: config.user_api_token.clone(),
            auth_token: config.auth_api_token.clone(),
        }
    }

    fn token_for(&self, tier: TokenTier) -> &str {
        match tier {
            TokenTier::Admin => &self.admin_token,
            TokenTier::User => &self.user_token,
            TokenTier::Auth => &self.auth_token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str, tier: TokenTier) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(self.token_for(tier))
            .header("Token-Type", tier.header_value())
    }

    // ─── Identity Exchange ───────────────────────────────────────

    /// Exchange a validated identity assertion for the canonical user
    /// record. The backend upserts by OAuth subject id.
    pub async fn exchange_identity(&self, upsert: &IdentityUpsert) -> Result<BackendUser, AppError> {
        let response = self
            .request(reqwest::Method::POST, "/users", TokenTier::Auth)
            .json(upsert)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        let envelope: Envelope<BackendUser> =
            self.check_response_json("Backend authentication failed", response).await?;
        Ok(envelope.data)
    }

    // ─── Readings & Earthquakes ──────────────────────────────────

    /// Fetch readings for a date range. At least one bound must be present;
    /// the route handler enforces that before calling.
    pub async fn readings_range(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<ReadingsSnapshot, AppError> {
        let response = self
            .request(reqwest::Method::GET, "/readings", TokenTier::Admin)
            .query(&[
                ("startDate", start_date.unwrap_or("")),
                ("endDate", end_date.unwrap_or("")),
                ("platform", "web"),
            ])
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        self.check_response_json("Failed to fetch readings", response)
            .await
    }

    /// List earthquake events.
    pub async fn list_earthquakes(&self) -> Result<EarthquakesSnapshot, AppError> {
        let response = self
            .request(reqwest::Method::GET, "/earthquakes", TokenTier::Admin)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        self.check_response_json("Failed to fetch earthquake records", response)
            .await
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn list_users(&self) -> Result<(Vec<BackendUser>, Option<Pagination>), AppError> {
        let response = self
            .request(reqwest::Method::GET, "/users", TokenTier::Admin)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        let envelope: UserListEnvelope =
            self.check_response_json("Failed to fetch users", response).await?;
        Ok((envelope.data, envelope.pagination))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<BackendUser, AppError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/users/{}", user_id),
                TokenTier::User,
            )
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        let envelope: Envelope<BackendUser> =
            self.check_response_json("Failed to fetch user", response).await?;
        Ok(envelope.data)
    }

    pub async fn update_role(&self, user_id: &str, role: Role) -> Result<BackendUser, AppError> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/users/{}/role", user_id),
                TokenTier::Admin,
            )
            .json(&serde_json::json!({ "role": role }))
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        let envelope: Envelope<BackendUser> =
            self.check_response_json("Failed to update user role", response).await?;
        Ok(envelope.data)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/users/{}", user_id),
                TokenTier::Admin,
            )
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        self.check_response("Failed to delete user", response).await
    }

    // ─── Notification Preferences (self-scoped) ──────────────────

    pub async fn update_alert_notification(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<BackendUser, AppError> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/users/{}/notifications", user_id),
                TokenTier::User,
            )
            .json(&serde_json::json!({ "alertNotification": enabled }))
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        let envelope: Envelope<BackendUser> = self
            .check_response_json("Failed to update notification preference", response)
            .await?;
        Ok(envelope.data)
    }

    pub async fn update_sms_notification(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<BackendUser, AppError> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/users/{}/sms-notifications", user_id),
                TokenTier::User,
            )
            .json(&serde_json::json!({ "smsNotification": enabled }))
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        let envelope: Envelope<BackendUser> = self
            .check_response_json("Failed to update sms notification", response)
            .await?;
        Ok(envelope.data)
    }

    /// Update the user's phone number. Local numbers get the `+63` country
    /// prefix; an empty input clears the stored number.
    pub async fn update_phone_number(
        &self,
        user_id: &str,
        phone_number: &str,
    ) -> Result<BackendUser, AppError> {
        let normalized = if phone_number.is_empty() {
            String::new()
        } else {
            format!("+63{}", phone_number)
        };

        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/users/{}/phone-number", user_id),
                TokenTier::User,
            )
            .json(&serde_json::json!({ "phoneNumber": normalized }))
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        let envelope: Envelope<BackendUser> = self
            .check_response_json("Failed to update user's phone number", response)
            .await?;
        Ok(envelope.data)
    }

    // ─── Device Control & Push ───────────────────────────────────

    pub async fn reset_iot_device(&self) -> Result<serde_json::Value, AppError> {
        let response = self
            .request(reqwest::Method::POST, "/iot/device/reset", TokenTier::Admin)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        self.check_response_json("Failed to reboot IoT device", response)
            .await
    }

    pub async fn push_subscribe(
        &self,
        user_id: &str,
        subscription: &serde_json::Value,
    ) -> Result<(), AppError> {
        let response = self
            .request(
                reqwest::Method::POST,
                "/push-notifications/subscribe",
                TokenTier::User,
            )
            .json(&serde_json::json!({ "subscription": subscription, "userId": user_id }))
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        self.check_response("Failed to subscribe to push notifications", response)
            .await
    }

    pub async fn push_unsubscribe(&self, user_id: &str) -> Result<(), AppError> {
        let response = self
            .request(
                reqwest::Method::POST,
                "/push-notifications/unsubscribe",
                TokenTier::User,
            )
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        self.check_response("Failed to unsubscribe from push notifications", response)
            .await
    }

    // ─── Response Handling ───────────────────────────────────────

    /// Check response status, discarding the body on success.
    async fn check_response(
        &self,
        context: &str,
        response: reqwest::Response,
    ) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.relay_error(context, response).await)
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        context: &str,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(self.relay_error(context, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::BackendUnavailable(format!("JSON parse error: {}", e)))
    }

    /// Build a relay error preserving the backend's status code.
    ///
    /// Prefers the backend's own `message` field when the error body
    /// carries one, otherwise derives a message from the status line.
    async fn relay_error(&self, context: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let backend_message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from));

        let message = match backend_message {
            Some(msg) => msg,
            None => format!(
                "{}: {} {}",
                context,
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ),
        };

        AppError::BackendApi {
            status: status.as_u16(),
            message,
        }
    }
}
