use chrono::{DateTime, Utc};
use log::{debug, info};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::client::{AgriClient, ApiError};
use crate::models::agri::{AnomalyEvent, FieldPlot, PlotId, SensorReading, SensorType};
use crate::services::polling::{Cadence, TickOutcome};
use crate::views::{ViewError, ViewPoller, ViewScope, inline_error};

/// One chart point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PlotDetailState {
    pub plot: Option<FieldPlot>,
    /// Ascending by timestamp within each sensor type.
    pub series: BTreeMap<SensorType, Vec<SeriesPoint>>,
    pub anomalies: Vec<AnomalyEvent>,
    pub error: Option<String>,
    pub last_loaded: Option<DateTime<Utc>>,
}

/// Group readings per sensor type. Readings tagged with another plot are
/// dropped; the list endpoint filter is not trusted.
pub fn build_series(plot_id: PlotId, readings: Vec<SensorReading>) -> BTreeMap<SensorType, Vec<SeriesPoint>> {
    let mut series: BTreeMap<SensorType, Vec<SeriesPoint>> = BTreeMap::new();
    for r in readings {
        if r.plot.is_some_and(|p| p != plot_id) {
            continue;
        }
        series.entry(r.sensor_type).or_default().push(SeriesPoint {
            timestamp: r.timestamp,
            value: r.value,
        });
    }
    for points in series.values_mut() {
        points.sort_by_key(|p| p.timestamp);
    }
    series
}

/// A 404 from a list endpoint means there is nothing to list yet.
fn or_empty<T>(result: Result<Vec<T>, ApiError>) -> Result<Vec<T>, ApiError> {
    match result {
        Err(ApiError::NotFound(_)) => Ok(Vec::new()),
        other => other,
    }
}

pub struct PlotDetailView {
    client: AgriClient,
    plot_id: PlotId,
    scope: ViewScope,
    state: RefCell<PlotDetailState>,
    poller: ViewPoller,
}

impl PlotDetailView {
    pub fn new(client: AgriClient, plot_id: PlotId, cadence: Cadence) -> Self {
        PlotDetailView {
            client,
            plot_id,
            scope: ViewScope::new(),
            state: RefCell::new(PlotDetailState::default()),
            poller: ViewPoller::new(cadence),
        }
    }

    pub fn plot_id(&self) -> PlotId {
        self.plot_id
    }

    pub fn scope(&self) -> ViewScope {
        self.scope.clone()
    }

    pub fn state(&self) -> PlotDetailState {
        self.state.borrow().clone()
    }

    pub fn poller(&self) -> &ViewPoller {
        &self.poller
    }

    fn fetch(&self) -> Result<PlotDetailState, ApiError> {
        let plot = self.client.get_plot(self.plot_id)?;
        let readings = or_empty(self.client.list_sensor_readings(Some(self.plot_id)))?;
        let mut anomalies = or_empty(self.client.list_anomalies(Some(self.plot_id)))?;
        anomalies.retain(|a| a.plot.is_none_or(|p| p == self.plot_id));
        anomalies.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(PlotDetailState {
            plot: Some(plot),
            series: build_series(self.plot_id, readings),
            anomalies,
            error: None,
            last_loaded: Some(Utc::now()),
        })
    }

    pub fn load(&self) -> Result<(), ViewError> {
        let fetched = self.fetch();
        if !self.scope.is_alive() {
            debug!("Plot {} view closed; discarding load result", self.plot_id.0);
            return Err(ViewError::Closed);
        }
        match fetched {
            Ok(state) => {
                info!(
                    "Plot {}: {} sensor series, {} anomalies",
                    self.plot_id.0,
                    state.series.len(),
                    state.anomalies.len()
                );
                *self.state.borrow_mut() = state;
                Ok(())
            }
            // only the plot lookup can still answer 404 here
            Err(ApiError::NotFound(_)) => {
                *self.state.borrow_mut() = PlotDetailState {
                    error: Some(format!("Plot {} not found", self.plot_id.0)),
                    ..Default::default()
                };
                Ok(())
            }
            Err(e) => {
                let message = inline_error(self.client.session(), "Failed to load plot", e)?;
                self.state.borrow_mut().error = Some(message);
                Ok(())
            }
        }
    }

    pub fn latest(&self, sensor_type: SensorType) -> Option<SeriesPoint> {
        self.state.borrow().series.get(&sensor_type).and_then(|s| s.last().copied())
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

impl Drop for PlotDetailView {
    fn drop(&mut self) {
        self.scope.close();
        self.poller.cancel();
    }
}
