use chrono::{DateTime, Utc};
use log::{debug, info};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::client::{AgriClient, ApiError};
use crate::models::agri::{AnomalyEvent, DashboardStats, FieldPlot, PlotStatus};
use crate::services::polling::{Cadence, TickOutcome};
use crate::views::{ViewError, ViewPoller, ViewScope, inline_error};

pub const RECENT_ANOMALIES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub stats: DashboardStats,
    pub plots: Vec<FieldPlot>,
    /// Most recent first, at most `RECENT_ANOMALIES`.
    pub recent_anomalies: Vec<AnomalyEvent>,
    pub error: Option<String>,
    pub last_loaded: Option<DateTime<Utc>>,
}

pub struct DashboardView {
    client: AgriClient,
    scope: ViewScope,
    state: RefCell<DashboardState>,
    poller: ViewPoller,
}

impl DashboardView {
    pub fn new(client: AgriClient, cadence: Cadence) -> Self {
        DashboardView {
            client,
            scope: ViewScope::new(),
            state: RefCell::new(DashboardState::default()),
            poller: ViewPoller::new(cadence),
        }
    }

    pub fn scope(&self) -> ViewScope {
        self.scope.clone()
    }

    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn poller(&self) -> &ViewPoller {
        &self.poller
    }

    fn fetch(&self) -> Result<(DashboardStats, Vec<FieldPlot>, Vec<AnomalyEvent>), ApiError> {
        let stats = self.client.dashboard_stats()?;
        let plots = self.client.list_plots(None)?;
        let mut anomalies = self.client.list_anomalies(None)?;
        anomalies.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        anomalies.truncate(RECENT_ANOMALIES);
        Ok((stats, plots, anomalies))
    }

    pub fn load(&self) -> Result<(), ViewError> {
        let fetched = self.fetch();
        if !self.scope.is_alive() {
            debug!("Dashboard closed; discarding load result");
            return Err(ViewError::Closed);
        }
        match fetched {
            Ok((stats, plots, recent_anomalies)) => {
                info!(
                    "Dashboard: {} farms, {} plots, {} active alerts",
                    stats.total_farms,
                    plots.len(),
                    stats.active_alerts
                );
                *self.state.borrow_mut() = DashboardState {
                    stats,
                    plots,
                    recent_anomalies,
                    error: None,
                    last_loaded: Some(Utc::now()),
                };
                Ok(())
            }
            Err(e) => {
                let message = inline_error(self.client.session(), "Failed to load dashboard", e)?;
                self.state.borrow_mut().error = Some(message);
                Ok(())
            }
        }
    }

    pub fn plots_by_status(&self) -> BTreeMap<PlotStatus, usize> {
        let mut counts = BTreeMap::new();
        for p in &self.state.borrow().plots {
            *counts.entry(p.status).or_insert(0) += 1;
        }
        counts
    }

    /// Plots in warning or alert state, worst first.
    pub fn plots_needing_attention(&self) -> Vec<FieldPlot> {
        let mut plots: Vec<FieldPlot> = self
            .state
            .borrow()
            .plots
            .iter()
            .filter(|p| p.status != PlotStatus::Normal)
            .cloned()
            .collect();
        plots.sort_by(|a, b| b.status.cmp(&a.status).then(b.anomaly_count.cmp(&a.anomaly_count)));
        plots
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

impl Drop for DashboardView {
    fn drop(&mut self) {
        self.scope.close();
        self.poller.cancel();
    }
}
