// SPDX-License-Identifier: MIT

//! Sensor reading and earthquake event models.
//!
//! Both streams are append-only: an event is immutable once received and
//! the sync layer never reorders or rewrites what it already holds.

use serde::{Deserialize, Serialize};

/// A timestamped seismic-intensity sample from the IoT sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub created_at: String,
    pub si_average: f64,
    pub si_maximum: f64,
    pub si_minimum: f64,
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub signal_strength: Option<String>,
}

/// A detected earthquake event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Earthquake {
    pub id: String,
    pub intensity: f64,
    pub duration: f64,
    pub created_at: String,
}

/// Full readings payload from the backend.
///
/// `data` is ordered newest first. The scalar fields are only meaningful
/// for a complete fetch; incremental pushes leave them untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsSnapshot {
    #[serde(default)]
    pub data: Vec<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_base64: Option<String>,
}

/// Full earthquakes payload from the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarthquakesSnapshot {
    #[serde(default)]
    pub data: Vec<Earthquake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
}
