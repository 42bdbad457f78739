//! View controllers: dashboard, alerts and plot detail.
//!
//! Every view owns a `ViewScope` and a `ViewPoller`. Dropping the view closes
//! the scope and cancels the poller; completions that arrive after that are
//! discarded instead of touching state.
//!
//! Error policy
//! - Authorization failures force a logout and surface as `SessionExpired`.
//! - Other read failures become an inline message; the view stays usable and
//!   keeps its last good data.

pub mod alerts;
pub mod dashboard;
pub mod plot_detail;

use log::{debug, info, warn};
use std::cell::Cell;
use std::num::NonZeroU32;
use std::rc::Rc;

use crate::client::ApiError;
use crate::services::polling::{Cadence, PollHandle, PollingScheduler, TickOutcome};
use crate::session::SessionStore;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("session expired; please log in again")]
    SessionExpired,
    #[error("view was closed before the operation completed")]
    Closed,
    #[error(transparent)]
    Api(ApiError),
    #[error("{0}")]
    Invalid(String),
}

/// Liveness of one view instance.
#[derive(Debug, Clone)]
pub struct ViewScope {
    alive: Rc<Cell<bool>>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    pub fn new() -> Self {
        ViewScope {
            alive: Rc::new(Cell::new(true)),
        }
    }

    pub fn close(&self) {
        self.alive.set(false);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }
}

/// Map an API error onto the view error policy, forcing the logout on
/// authorization failures.
pub(crate) fn classify(session: &SessionStore, err: ApiError) -> ViewError {
    if err.is_auth_failure() {
        let _ = session.check_auth::<()>(Err(err));
        ViewError::SessionExpired
    } else {
        ViewError::Api(err)
    }
}

/// Read-path variant of `classify`: anything but an expired session becomes
/// an inline message.
pub(crate) fn inline_error(session: &SessionStore, context: &str, err: ApiError) -> Result<String, ViewError> {
    match classify(session, err) {
        ViewError::Api(e) => {
            warn!("{}: {}", context, e);
            Ok(format!("{}: {}", context, e))
        }
        other => Err(other),
    }
}

pub struct ViewPoller {
    scheduler: PollingScheduler,
    handle: PollHandle,
}

impl ViewPoller {
    pub fn new(cadence: Cadence) -> Self {
        let (scheduler, handle) = PollingScheduler::new(cadence);
        ViewPoller { scheduler, handle }
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    pub fn label(&self) -> String {
        self.scheduler.label()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Inspect the outcome of a reload. An expired session stops polling.
    /// Returns whether the view has fresh data to show.
    pub fn settle(&self, outcome: Result<(), ViewError>) -> bool {
        match outcome {
            Ok(()) => true,
            Err(ViewError::SessionExpired) => {
                info!("Session expired; stopping refresh");
                self.handle.cancel();
                false
            }
            Err(e) => {
                debug!("Refresh skipped: {}", e);
                false
            }
        }
    }

    pub fn tick(&self, reload: impl Fn() -> Result<(), ViewError>) -> TickOutcome {
        self.scheduler.tick(&mut || {
            self.settle(reload());
        })
    }

    pub fn run(&self, max_fires: Option<NonZeroU32>, reload: impl FnMut()) {
        self.scheduler.run(max_fires, reload)
    }
}
