// SPDX-License-Identifier: MIT

//! User model as returned by the platform backend.

use serde::{Deserialize, Serialize};

/// Authorization role attached to every user record and session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Canonical user record held by the platform backend.
///
/// Created by the identity exchange on first sign-in (upsert by OAuth
/// subject id) and mutated only through explicit preference/role calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    pub role: Role,
    pub alert_notification: bool,
    #[serde(default)]
    pub sms_notification: bool,
    #[serde(default)]
    pub phone_number: String,
    pub oauth_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Pagination metadata passed through from backend list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}
