//! Canonical recommendation shape and the mapping onto it.
//!
//! The backend has answered with three different payload shapes over time
//! (`recommended_action`, `recommendation`, `action`). When the backend call
//! fails entirely, a local rule table produces a fallback so the user always
//! gets something to act on.

use chrono::{DateTime, Utc};

use crate::models::agri::{AnomalyId, RecommendationId, RecommendationPayload, Severity};

pub const DEFAULT_ACTION: &str = "Monitor the plot closely and conduct a manual inspection to verify conditions.";
pub const DEFAULT_EXPLANATION: &str = "No explanation was provided for this recommendation.";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecommendationOrigin {
    Backend,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub id: Option<RecommendationId>,
    pub anomaly: Option<AnomalyId>,
    pub action: String,
    pub explanation: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub origin: RecommendationOrigin,
}

/// Which action field a backend payload carries, in precedence order.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionShape {
    RecommendedAction(String),
    Recommendation(String),
    Action(String),
    Unrecognized,
}

impl ActionShape {
    pub fn classify(payload: &RecommendationPayload) -> Self {
        if let Some(a) = present(&payload.recommended_action) {
            ActionShape::RecommendedAction(a)
        } else if let Some(a) = present(&payload.recommendation) {
            ActionShape::Recommendation(a)
        } else if let Some(a) = present(&payload.action) {
            ActionShape::Action(a)
        } else {
            ActionShape::Unrecognized
        }
    }

    fn default_confidence(&self) -> f64 {
        match self {
            ActionShape::RecommendedAction(_) => 0.8,
            ActionShape::Recommendation(_) => 0.7,
            ActionShape::Action(_) => 0.75,
            ActionShape::Unrecognized => 0.75,
        }
    }

    fn into_action(self) -> String {
        match self {
            ActionShape::RecommendedAction(a) | ActionShape::Recommendation(a) | ActionShape::Action(a) => a,
            ActionShape::Unrecognized => DEFAULT_ACTION.to_string(),
        }
    }
}

/// Everything that can be turned into a canonical recommendation.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationSource {
    Backend(RecommendationPayload),
    Fallback(FallbackRecommendation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackRecommendation {
    pub anomaly: Option<AnomalyId>,
    pub action: &'static str,
    pub explanation: &'static str,
    pub confidence: f64,
}

fn present(field: &Option<String>) -> Option<String> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn normalize(source: RecommendationSource, now: DateTime<Utc>) -> Recommendation {
    match source {
        RecommendationSource::Backend(payload) => {
            let shape = ActionShape::classify(&payload);
            let confidence = payload.confidence.unwrap_or_else(|| shape.default_confidence());
            let explanation = present(&payload.explanation_text)
                .or_else(|| present(&payload.explanation))
                .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());
            Recommendation {
                id: payload.id,
                anomaly: payload.anomaly_event,
                action: shape.into_action(),
                explanation,
                confidence,
                timestamp: payload.timestamp.unwrap_or(now),
                origin: RecommendationOrigin::Backend,
            }
        }
        RecommendationSource::Fallback(f) => Recommendation {
            id: None,
            anomaly: f.anomaly,
            action: f.action.to_string(),
            explanation: f.explanation.to_string(),
            confidence: f.confidence,
            timestamp: now,
            origin: RecommendationOrigin::Fallback,
        },
    }
}

struct Rule {
    all_of: &'static [&'static str],
    action: &'static str,
    explanation: &'static str,
    confidence: f64,
}

// Order matters: the first rule whose keywords all appear wins.
const RULES: &[Rule] = &[
    Rule {
        all_of: &["moisture", "low"],
        action: "Increase irrigation by 20-30% for the next 48 hours",
        explanation: "Soil moisture has dropped below the optimal range for this crop. Irrigation failure or increased evaporation is likely.",
        confidence: 0.85,
    },
    Rule {
        all_of: &["moisture", "high"],
        action: "Reduce irrigation and check the drainage system",
        explanation: "Soil moisture is above the optimal range. Waterlogged soil raises the risk of root rot and fungal disease.",
        confidence: 0.80,
    },
    Rule {
        all_of: &["temperature", "high"],
        action: "Increase shade coverage and move irrigation to early morning or late evening",
        explanation: "Temperature is above the optimal range. Sustained heat causes crop stress and faster water loss.",
        confidence: 0.82,
    },
    Rule {
        all_of: &["temperature", "low"],
        action: "Install thermal covers and monitor for frost damage overnight",
        explanation: "Temperature is below the optimal range. Cold slows growth and may damage sensitive crops.",
        confidence: 0.75,
    },
    Rule {
        all_of: &["humidity", "high"],
        action: "Improve ventilation and monitor for fungal disease",
        explanation: "High humidity promotes fungal growth and reduces transpiration efficiency.",
        confidence: 0.78,
    },
];

fn severity_default(severity: Severity) -> (&'static str, &'static str, f64) {
    match severity {
        Severity::High => (
            "Inspect the plot immediately and verify sensor readings on site",
            "A high-severity anomaly was detected with no specific guidance available.",
            0.7,
        ),
        Severity::Low => (
            "Continue monitoring; no immediate action required",
            "A low-severity anomaly was detected. Conditions should be watched but are not critical.",
            0.5,
        ),
        Severity::Medium | Severity::Unknown => (
            "Schedule a field inspection within the next 24 hours",
            "A medium-severity anomaly was detected. A manual check will confirm whether action is needed.",
            0.6,
        ),
    }
}

/// Deterministic local recommendation, used only when the backend call fails.
pub fn fallback_for(anomaly: Option<AnomalyId>, anomaly_type: &str, severity: Severity) -> FallbackRecommendation {
    let kind = anomaly_type.to_lowercase();
    if let Some(rule) = RULES.iter().find(|r| r.all_of.iter().all(|k| kind.contains(k))) {
        return FallbackRecommendation {
            anomaly,
            action: rule.action,
            explanation: rule.explanation,
            confidence: rule.confidence,
        };
    }
    let (action, explanation, confidence) = severity_default(severity);
    FallbackRecommendation {
        anomaly,
        action,
        explanation,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn backend(json: &str) -> Recommendation {
        let payload: RecommendationPayload = serde_json::from_str(json).unwrap();
        normalize(RecommendationSource::Backend(payload), now())
    }

    #[test]
    fn recommended_action_wins_over_recommendation() {
        let r = backend(r#"{"recommended_action": "Irrigate", "recommendation": "Wait", "action": "Ignore"}"#);
        assert_eq!(r.action, "Irrigate");
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.origin, RecommendationOrigin::Backend);
    }

    #[test]
    fn default_confidence_depends_on_matched_shape() {
        assert_eq!(backend(r#"{"recommendation": "x"}"#).confidence, 0.7);
        assert_eq!(backend(r#"{"action": "x"}"#).confidence, 0.75);

        let empty = backend("{}");
        assert_eq!(empty.confidence, 0.75);
        assert_eq!(empty.action, DEFAULT_ACTION);
        assert_eq!(empty.explanation, DEFAULT_EXPLANATION);
        assert_eq!(empty.timestamp, now());
    }

    #[test]
    fn explicit_confidence_and_fields_are_kept() {
        let r = backend(
            r#"{"id": 12, "anomaly_event": 4, "recommended_action": "Shade", "explanation_text": "Heat",
                "explanation": "ignored", "confidence": 0.93, "timestamp": "2025-05-30T08:00:00Z"}"#,
        );
        assert_eq!(r.id, Some(RecommendationId(12)));
        assert_eq!(r.anomaly, Some(AnomalyId(4)));
        assert_eq!(r.explanation, "Heat");
        assert_eq!(r.confidence, 0.93);
        assert_eq!(r.timestamp, Utc.with_ymd_and_hms(2025, 5, 30, 8, 0, 0).unwrap());
    }

    #[test]
    fn blank_fields_count_as_absent() {
        let r = backend(r#"{"recommended_action": "  ", "recommendation": "Drain", "explanation_text": "", "explanation": "Wet"}"#);
        assert_eq!(r.action, "Drain");
        assert_eq!(r.confidence, 0.7);
        assert_eq!(r.explanation, "Wet");
    }

    #[test]
    fn low_soil_moisture_rule_ignores_severity() {
        for severity in [Severity::Low, Severity::Medium, Severity::High, Severity::Unknown] {
            let f = fallback_for(None, "low_soil_moisture", severity);
            assert_eq!(f.action, "Increase irrigation by 20-30% for the next 48 hours");
            assert_eq!(f.confidence, 0.85);
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        // matches both moisture+low and temperature+high; moisture+low comes first
        let f = fallback_for(None, "SOIL_MOISTURE_LOW_TEMPERATURE_HIGH", Severity::High);
        assert_eq!(f.confidence, 0.85);

        assert_eq!(fallback_for(None, "temperature_high", Severity::Low).confidence, 0.82);
        assert_eq!(fallback_for(None, "temperature_low", Severity::Low).confidence, 0.75);
        assert_eq!(fallback_for(None, "humidity_high", Severity::Low).confidence, 0.78);
    }

    #[test]
    fn unmatched_types_fall_back_to_severity_table() {
        assert_eq!(fallback_for(None, "sensor_failure", Severity::High).confidence, 0.7);
        assert_eq!(fallback_for(None, "sensor_failure", Severity::Low).confidence, 0.5);
        let unknown = fallback_for(None, "humidity_low", Severity::Unknown);
        let medium = fallback_for(None, "humidity_low", Severity::Medium);
        assert_eq!(unknown, medium);
    }

    #[test]
    fn fallback_normalizes_with_fallback_origin() {
        let f = fallback_for(Some(AnomalyId(3)), "drift_detected", Severity::Medium);
        let r = normalize(RecommendationSource::Fallback(f), now());
        assert_eq!(r.origin, RecommendationOrigin::Fallback);
        assert_eq!(r.anomaly, Some(AnomalyId(3)));
        assert_eq!(r.id, None);
        assert_eq!(r.confidence, 0.6);
    }
}
