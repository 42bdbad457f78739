//! Models for the agricultural monitoring REST API (`/api`).
//!
//! Scope: wire types only (request bodies and response payloads).
//!
//! Notes
//! - The backend is not consistent about field names across list/detail
//!   endpoints; aliases cover the variants it is known to send.
//! - Date/time fields use `chrono` (`DateTime<Utc>`).
//! - Recommendation payloads stay loosely typed here (`RecommendationPayload`);
//!   `services::recommendation` turns them into the canonical shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::recommendation::Recommendation;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FarmId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlotId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendationId(pub i64);

// =====================
// Enums
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Farmer,
}

impl Role {
    /// Role is computed on the client, never taken from the server.
    pub fn derive(is_staff: bool, is_superuser: bool) -> Self {
        if is_staff || is_superuser {
            Role::Admin
        } else {
            Role::Farmer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Farmer => "farmer",
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStatus {
    #[default]
    Normal,
    Warning,
    Alert,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    #[serde(alias = "moisture")]
    SoilMoisture,
    #[serde(other)]
    Unknown,
}

impl SensorType {
    pub fn unit(&self) -> &'static str {
        match self {
            SensorType::Temperature => "°C",
            SensorType::Humidity | SensorType::SoilMoisture => "%",
            SensorType::Unknown => "",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Unknown => "unknown",
        }
    }
}

// =====================
// Auth
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Response of `POST /auth/refresh/`. A refresh token is only present when
/// the server rotates it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedToken {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Profile as returned by `GET /auth/user/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// The session's user: a fetched profile plus the role derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl From<UserProfile> for User {
    fn from(p: UserProfile) -> Self {
        User {
            role: Role::derive(p.is_staff, p.is_superuser),
            id: p.id,
            username: p.username,
            email: p.email,
            first_name: p.first_name,
            last_name: p.last_name,
            is_staff: p.is_staff,
            is_superuser: p.is_superuser,
        }
    }
}

impl User {
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() { self.username.clone() } else { full }
    }
}

// =====================
// Farms & plots
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub id: FarmId,
    #[serde(default)]
    pub owner: Option<UserId>,
    pub location: String,
    /// Hectares.
    pub size: f64,
    pub crop_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmInput {
    pub location: String,
    pub size: f64,
    pub crop_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPlot {
    pub id: PlotId,
    pub crop_variety: String,
    #[serde(default)]
    pub status: PlotStatus,
    #[serde(default)]
    pub anomaly_count: u32,
    #[serde(default)]
    pub farm: Option<FarmId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotInput {
    pub farm: FarmId,
    pub crop_variety: String,
}

// =====================
// Sensor data
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: ReadingId,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub plot: Option<PlotId>,
    pub sensor_type: SensorType,
    pub value: f64,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSensorReading {
    pub plot: PlotId,
    pub sensor_type: SensorType,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

// =====================
// Anomalies & recommendations
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub id: AnomalyId,
    pub anomaly_type: String,
    pub severity: Severity,
    #[serde(rename = "confidence_score", alias = "model_confidence", default)]
    pub confidence: f64,
    #[serde(alias = "timestamp", default)]
    pub detected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plot: Option<PlotId>,
    #[serde(default)]
    pub field_plot_name: Option<String>,
    #[serde(default)]
    pub resolved: bool,
    /// Action summary of the stored recommendation, if the backend has one.
    #[serde(default)]
    pub agent_recommendation: Option<String>,
    /// Canonical recommendation attached on the client after a fetch or generate call.
    #[serde(skip)]
    pub recommendation: Option<Recommendation>,
}

impl AnomalyEvent {
    pub fn plot_label(&self) -> String {
        match (&self.field_plot_name, self.plot) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(id)) => format!("Plot {}", id.0),
            _ => "Unknown".to_string(),
        }
    }
}

/// Recommendation as sent by the backend. Every field is optional because
/// the endpoints disagree on the shape; see `services::recommendation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationPayload {
    pub id: Option<RecommendationId>,
    #[serde(alias = "anomaly")]
    pub anomaly_event: Option<AnomalyId>,
    pub recommended_action: Option<String>,
    pub recommendation: Option<String>,
    pub action: Option<String>,
    pub explanation_text: Option<String>,
    pub explanation: Option<String>,
    pub confidence: Option<f64>,
    #[serde(alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendRequest {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_regenerate: bool,
}

// =====================
// Dashboard
// =====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub total_farms: u64,
    pub total_plots: u64,
    pub total_anomalies: u64,
    pub active_alerts: u64,
}

/// List endpoints answer with either a bare array or a paginated envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Plain(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> ListPayload<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListPayload::Plain(v) => v,
            ListPayload::Paged { results } => results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_is_admin_for_staff_or_superuser() {
        assert_eq!(Role::derive(true, false), Role::Admin);
        assert_eq!(Role::derive(false, true), Role::Admin);
        assert_eq!(Role::derive(true, true), Role::Admin);
        assert_eq!(Role::derive(false, false), Role::Farmer);
    }

    #[test]
    fn server_role_field_is_ignored() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": 3, "username": "ana", "role": "admin", "is_staff": false, "is_superuser": false}"#,
        )
        .unwrap();
        assert_eq!(User::from(profile).role, Role::Farmer);
    }

    #[test]
    fn anomaly_accepts_list_and_serializer_shapes() {
        let listed: AnomalyEvent = serde_json::from_str(
            r#"{"id": 1, "anomaly_type": "soil_moisture_low", "severity": "high",
                "confidence_score": 0.91, "detected_at": "2025-06-01T10:00:00Z",
                "field_plot_name": "Merlot", "plot": 4, "sensor_reading_id": null,
                "agent_recommendation": null, "resolved": false}"#,
        )
        .unwrap();
        assert_eq!(listed.confidence, 0.91);
        assert_eq!(listed.plot, Some(PlotId(4)));
        assert_eq!(listed.plot_label(), "Merlot");

        let raw: AnomalyEvent = serde_json::from_str(
            r#"{"id": 2, "timestamp": "2025-06-01T10:00:00Z", "plot": 7,
                "anomaly_type": "temperature_high", "severity": "critical", "model_confidence": 0.5}"#,
        )
        .unwrap();
        assert_eq!(raw.confidence, 0.5);
        assert_eq!(raw.severity, Severity::Unknown);
        assert!(raw.detected_at.is_some());
        assert_eq!(raw.plot_label(), "Plot 7");
    }

    #[test]
    fn sensor_type_accepts_backend_moisture_alias() {
        let r: SensorReading = serde_json::from_str(
            r#"{"id": 9, "timestamp": "2025-06-01T10:00:00+00:00", "sensor_type": "moisture", "value": 31.5, "plot": 2}"#,
        )
        .unwrap();
        assert_eq!(r.sensor_type, SensorType::SoilMoisture);
    }

    #[test]
    fn list_payload_unwraps_paginated_envelope() {
        let paged: ListPayload<FieldPlot> = serde_json::from_str(
            r#"{"count": 1, "next": null, "results": [{"id": 1, "crop_variety": "Syrah", "status": "alert", "anomaly_count": 2, "farm": 1}]}"#,
        )
        .unwrap();
        let plots = paged.into_vec();
        assert_eq!(plots.len(), 1);
        assert_eq!(plots[0].status, PlotStatus::Alert);
    }

    #[test]
    fn recommend_request_omits_flag_unless_forced() {
        let plain = serde_json::to_string(&RecommendRequest { force_regenerate: false }).unwrap();
        let forced = serde_json::to_string(&RecommendRequest { force_regenerate: true }).unwrap();
        assert_eq!(plain, "{}");
        assert_eq!(forced, r#"{"force_regenerate":true}"#);
    }
}
