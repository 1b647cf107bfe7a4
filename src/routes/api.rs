// SPDX-License-Identifier: MIT

//! API routes for authenticated sessions.
//!
//! Every handler requires a session (the middleware is applied in
//! routes/mod.rs), selects a credential tier, and relays a single backend
//! call. Non-2xx backend statuses pass through unchanged; handler-internal
//! failures become a generic 500.

use crate::error::{AppError, Result};
use crate::middleware::session::{require_admin, SessionUser};
use crate::models::{BackendUser, EarthquakesSnapshot, Pagination, ReadingsSnapshot, Role};
use crate::sync::StreamKey;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require a session).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/readings", get(get_readings))
        .route("/api/earthquakes", get(get_earthquakes))
        .route("/api/live/readings", get(live_readings))
        .route("/api/live/earthquakes", get(live_earthquakes))
        .route("/api/live/status", get(live_status))
        .route("/api/users", get(list_users))
        .route("/api/users/{user_id}", get(get_user).delete(delete_user))
        .route("/api/users/{user_id}/role", patch(update_role))
        .route("/api/notifications", patch(update_notifications))
        .route("/api/sms-notification", patch(update_sms_notification))
        .route("/api/phone-number", patch(update_phone_number))
        .route("/api/iot/reset", post(reset_iot_device))
        .route("/api/push-subscribe", post(push_subscribe))
        .route("/api/push-unsubscribe", post(push_unsubscribe))
}

// ─── Session ─────────────────────────────────────────────────────

/// The session shape every consumer relies on.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SessionUserView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: Role,
    pub alert_notification: bool,
    pub sms_notification: bool,
    pub phone_number: String,
    pub oauth_id: String,
}

impl SessionResponse {
    pub fn from_session(user: &SessionUser) -> Self {
        Self {
            user: SessionUserView {
                id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                image: user.picture.clone(),
                role: user.role,
                alert_notification: user.alert_notification,
                sms_notification: user.sms_notification,
                phone_number: user.phone_number.clone(),
                oauth_id: user.oauth_id.clone(),
            },
        }
    }

    pub fn from_backend_user(user: &BackendUser) -> Self {
        Self {
            user: SessionUserView {
                id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                image: user.profile_image.clone(),
                role: user.role,
                alert_notification: user.alert_notification,
                sms_notification: user.sms_notification,
                phone_number: user.phone_number.clone(),
                oauth_id: user.oauth_id.clone(),
            },
        }
    }
}

/// Current session claims, as minted at the last sign-in exchange.
async fn get_session(Extension(user): Extension<SessionUser>) -> Json<SessionResponse> {
    Json(SessionResponse::from_session(&user))
}

// ─── Readings & Earthquakes ──────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingsQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Fetch readings for a date range (admin-tier relay).
async fn get_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsQuery>,
) -> Result<Json<ReadingsSnapshot>> {
    if params.start_date.is_none() && params.end_date.is_none() {
        return Err(AppError::BadRequest(
            "Invalid date range: requires at least one date (startDate or endDate)".to_string(),
        ));
    }

    let snapshot = state
        .backend
        .readings_range(params.start_date.as_deref(), params.end_date.as_deref())
        .await?;

    Ok(Json(snapshot))
}

/// List earthquake events. Readable by any authenticated session.
async fn get_earthquakes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EarthquakesSnapshot>> {
    let snapshot = state.backend.list_earthquakes().await?;
    Ok(Json(snapshot))
}

// ─── Live Cache ──────────────────────────────────────────────────

/// Serve the live readings cache; a stale or empty entry triggers a full
/// re-fetch of the current day before responding.
async fn live_readings(State(state): State<Arc<AppState>>) -> Result<Json<ReadingsSnapshot>> {
    if state.cache.needs_fetch(StreamKey::Readings) {
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let snapshot = state.backend.readings_range(Some(&today), Some(&today)).await?;
        state.cache.replace_readings(snapshot);
    }

    // Populated just above when absent.
    let snapshot = state.cache.readings().unwrap_or_default();
    Ok(Json(snapshot))
}

/// Serve the live earthquakes cache with the same stale-triggered re-fetch.
async fn live_earthquakes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EarthquakesSnapshot>> {
    if state.cache.needs_fetch(StreamKey::Earthquakes) {
        let snapshot = state.backend.list_earthquakes().await?;
        state.cache.replace_earthquakes(snapshot);
    }

    let snapshot = state.cache.earthquakes().unwrap_or_default();
    Ok(Json(snapshot))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LiveStatusResponse {
    is_connected: bool,
    mode: &'static str,
}

/// Connectivity of the live channel. Always connected in poll mode.
async fn live_status(State(state): State<Arc<AppState>>) -> Json<LiveStatusResponse> {
    Json(LiveStatusResponse {
        is_connected: state.live.is_connected(),
        mode: match state.live.mode() {
            crate::sync::SyncMode::Push => "push",
            crate::sync::SyncMode::Poll => "poll",
        },
    })
}

// ─── Users ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct UserListResponse {
    data: Vec<BackendUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

/// List all users (admin only).
async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<UserListResponse>> {
    require_admin(&user)?;

    let (data, pagination) = state.backend.list_users().await?;
    Ok(Json(UserListResponse { data, pagination }))
}

/// Fetch a single user record (user-tier relay).
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BackendUser>> {
    let user = state.backend.get_user(&user_id).await?;
    Ok(Json(user))
}

#[derive(Deserialize)]
struct RoleUpdate {
    role: Option<Role>,
}

/// Change a user's role (admin only).
///
/// The updated role takes effect in the target's session only at their
/// next sign-in; existing session claims are fixed at mint time.
async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(user_id): Path<String>,
    Json(body): Json<RoleUpdate>,
) -> Result<Json<BackendUser>> {
    require_admin(&user)?;

    let Some(role) = body.role else {
        return Err(AppError::BadRequest("Role is required".to_string()));
    };

    tracing::info!(
        admin_id = %user.id,
        target_id = %user_id,
        role = ?role,
        "Role update"
    );

    let updated = state.backend.update_role(&user_id, role).await?;
    Ok(Json(updated))
}

#[derive(Serialize)]
struct DeleteUserResponse {
    success: bool,
}

/// Delete a user record (admin only).
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteUserResponse>> {
    require_admin(&user)?;

    tracing::info!(admin_id = %user.id, target_id = %user_id, "User deletion");

    state.backend.delete_user(&user_id).await?;
    Ok(Json(DeleteUserResponse { success: true }))
}

// ─── Notification Preferences (self-scoped) ──────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertNotificationUpdate {
    alert_notification: bool,
}

async fn update_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(body): Json<AlertNotificationUpdate>,
) -> Result<Json<BackendUser>> {
    let updated = state
        .backend
        .update_alert_notification(&user.id, body.alert_notification)
        .await?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmsNotificationUpdate {
    sms_notification: bool,
}

async fn update_sms_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(body): Json<SmsNotificationUpdate>,
) -> Result<Json<BackendUser>> {
    let updated = state
        .backend
        .update_sms_notification(&user.id, body.sms_notification)
        .await?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhoneNumberUpdate {
    #[serde(default)]
    phone_number: String,
}

async fn update_phone_number(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(body): Json<PhoneNumberUpdate>,
) -> Result<Json<BackendUser>> {
    let updated = state
        .backend
        .update_phone_number(&user.id, &body.phone_number)
        .await?;
    Ok(Json(updated))
}

// ─── Device Control & Push ───────────────────────────────────────

/// Reboot the IoT sensor (admin only).
async fn reset_iot_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&user)?;

    tracing::info!(admin_id = %user.id, "IoT device reset requested");

    let result = state.backend.reset_iot_device().await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
struct PushSubscribeBody {
    subscription: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct PushResponse {
    success: bool,
}

/// Register a browser push subscription for the session's user.
async fn push_subscribe(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(body): Json<PushSubscribeBody>,
) -> Result<Json<PushResponse>> {
    let Some(subscription) = body.subscription else {
        return Err(AppError::BadRequest("Missing subscription".to_string()));
    };

    state.backend.push_subscribe(&user.id, &subscription).await?;
    Ok(Json(PushResponse { success: true }))
}

/// Remove the user's push subscription.
async fn push_unsubscribe(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<PushResponse>> {
    state.backend.push_unsubscribe(&user.id).await?;
    Ok(Json(PushResponse { success: true }))
}
