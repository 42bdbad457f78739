use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::num::NonZeroU32;

use crate::client::{AgriClient, ApiError};
use crate::models::agri::{AnomalyEvent, AnomalyId, RecommendationPayload, Severity};
use crate::services::polling::{Cadence, TickOutcome};
use crate::services::recommendation::{Recommendation, RecommendationSource, fallback_for, normalize};
use crate::views::{ViewError, ViewPoller, ViewScope, classify, inline_error};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub include_resolved: bool,
    /// Case-insensitive match on anomaly type or plot name.
    pub search: Option<String>,
}

impl AlertFilter {
    fn matches(&self, a: &AnomalyEvent) -> bool {
        if !self.include_resolved && a.resolved {
            return false;
        }
        if let Some(s) = self.severity
            && a.severity != s
        {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                a.anomaly_type.to_lowercase().contains(&needle) || a.plot_label().to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AlertsState {
    pub anomalies: Vec<AnomalyEvent>,
    pub error: Option<String>,
    pub last_loaded: Option<DateTime<Utc>>,
}

pub struct AlertsView {
    client: AgriClient,
    scope: ViewScope,
    state: RefCell<AlertsState>,
    filter: RefCell<AlertFilter>,
    poller: ViewPoller,
}

impl AlertsView {
    pub fn new(client: AgriClient, cadence: Cadence) -> Self {
        AlertsView {
            client,
            scope: ViewScope::new(),
            state: RefCell::new(AlertsState::default()),
            filter: RefCell::new(AlertFilter::default()),
            poller: ViewPoller::new(cadence),
        }
    }

    pub fn scope(&self) -> ViewScope {
        self.scope.clone()
    }

    pub fn state(&self) -> AlertsState {
        self.state.borrow().clone()
    }

    pub fn poller(&self) -> &ViewPoller {
        &self.poller
    }

    pub fn set_filter(&self, filter: AlertFilter) {
        *self.filter.borrow_mut() = filter;
    }

    /// Reload every anomaly and its stored recommendation, replacing the
    /// previous state wholesale.
    pub fn load(&self) -> Result<(), ViewError> {
        let session = self.client.session();
        let fetched = self.fetch();
        if !self.scope.is_alive() {
            debug!("Alerts view closed; discarding load result");
            return Err(ViewError::Closed);
        }
        match fetched {
            Ok(anomalies) => {
                info!("Alerts: loaded {} anomalies", anomalies.len());
                *self.state.borrow_mut() = AlertsState {
                    anomalies,
                    error: None,
                    last_loaded: Some(Utc::now()),
                };
                Ok(())
            }
            Err(e) => {
                let message = inline_error(session, "Failed to load alerts", e)?;
                self.state.borrow_mut().error = Some(message);
                Ok(())
            }
        }
    }

    fn fetch(&self) -> Result<Vec<AnomalyEvent>, ApiError> {
        let now = Utc::now();
        let mut anomalies = self.client.list_anomalies(None)?;
        for a in anomalies.iter_mut() {
            let stored = match self.client.list_recommendations(a.id) {
                Ok(list) => list.into_iter().next(),
                Err(e) if e.is_auth_failure() => return Err(e),
                Err(e) => {
                    debug!("No recommendation for anomaly {}: {}", a.id.0, e);
                    None
                }
            };
            let payload = stored.or_else(|| {
                a.agent_recommendation.clone().map(|summary| RecommendationPayload {
                    anomaly_event: Some(a.id),
                    recommendation: Some(summary),
                    ..Default::default()
                })
            });
            a.recommendation = payload.map(|p| normalize(RecommendationSource::Backend(p), now));
        }
        anomalies.sort_by(|x, y| y.detected_at.cmp(&x.detected_at));
        Ok(anomalies)
    }

    pub fn visible(&self) -> Vec<AnomalyEvent> {
        let filter = self.filter.borrow();
        self.state
            .borrow()
            .anomalies
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect()
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        let state = self.state.borrow();
        let mut counts = SeverityCounts::default();
        for a in state.anomalies.iter().filter(|a| !a.resolved) {
            counts.unresolved += 1;
            match a.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Unknown => {}
            }
        }
        counts
    }

    /// Ask the backend for a recommendation; when that fails for any reason
    /// other than an expired session, fall back to the local rule table.
    pub fn generate_recommendation(&self, anomaly_id: AnomalyId, force: bool) -> Result<Recommendation, ViewError> {
        let (anomaly_type, severity) = {
            let state = self.state.borrow();
            let a = state
                .anomalies
                .iter()
                .find(|a| a.id == anomaly_id)
                .ok_or_else(|| ViewError::Invalid(format!("anomaly {} is not loaded", anomaly_id.0)))?;
            (a.anomaly_type.clone(), a.severity)
        };

        let result = if force {
            self.client.regenerate_recommendation(anomaly_id)
        } else {
            self.client.generate_recommendation(anomaly_id)
        };
        let source = match result {
            Ok(mut payload) => {
                payload.anomaly_event.get_or_insert(anomaly_id);
                RecommendationSource::Backend(payload)
            }
            Err(e) if e.is_auth_failure() => return Err(classify(self.client.session(), e)),
            Err(e) => {
                warn!("Recommendation for anomaly {} failed, using local rules: {}", anomaly_id.0, e);
                RecommendationSource::Fallback(fallback_for(Some(anomaly_id), &anomaly_type, severity))
            }
        };

        if !self.scope.is_alive() {
            debug!("Alerts view closed; discarding recommendation for {}", anomaly_id.0);
            return Err(ViewError::Closed);
        }
        let rec = normalize(source, Utc::now());
        let mut state = self.state.borrow_mut();
        if let Some(a) = state.anomalies.iter_mut().find(|a| a.id == anomaly_id) {
            a.agent_recommendation = Some(rec.action.clone());
            a.recommendation = Some(rec.clone());
        }
        Ok(rec)
    }

    pub fn resolve(&self, anomaly_id: AnomalyId) -> Result<(), ViewError> {
        self.client
            .resolve_anomaly(anomaly_id)
            .map_err(|e| classify(self.client.session(), e))?;
        if !self.scope.is_alive() {
            return Err(ViewError::Closed);
        }
        if let Some(a) = self.state.borrow_mut().anomalies.iter_mut().find(|a| a.id == anomaly_id) {
            a.resolved = true;
        }
        info!("Anomaly {} resolved", anomaly_id.0);
        Ok(())
    }

    /// Apply the anomaly's backend recommendation. Locally generated
    /// fallbacks have no server id and cannot be applied.
    pub fn apply_recommendation(&self, anomaly_id: AnomalyId) -> Result<(), ViewError> {
        let rec_id = self
            .state
            .borrow()
            .anomalies
            .iter()
            .find(|a| a.id == anomaly_id)
            .and_then(|a| a.recommendation.as_ref())
            .and_then(|r| r.id)
            .ok_or_else(|| ViewError::Invalid(format!("anomaly {} has no stored recommendation", anomaly_id.0)))?;
        self.client
            .apply_recommendation(rec_id)
            .map_err(|e| classify(self.client.session(), e))
    }

    pub fn tick(&self) -> TickOutcome {
        self.poller.tick(|| self.load())
    }

    pub fn run(&self, max_fires: Option<NonZeroU32>, mut on_update: impl FnMut(&Self)) {
        self.poller.run(max_fires, || {
            if self.poller.settle(self.load()) {
                on_update(self);
            }
        })
    }
}

impl Drop for AlertsView {
    fn drop(&mut self) {
        self.scope.close();
        self.poller.cancel();
    }
}
