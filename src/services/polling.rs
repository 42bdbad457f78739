//! Countdown-driven refresh scheduling for views.
//!
//! A `Cadence` is a (tick interval, trigger count) pair. Every tick moves the
//! countdown one step down; the tick that reaches zero fires the refresh and
//! rearms the countdown, so one cycle is exactly `trigger` ticks.

use log::{debug, info};
use std::cell::{Cell, RefCell};
use std::num::NonZeroU32;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use crate::observable::{Observable, Subscription};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Cadence {
    pub tick: Duration,
    pub trigger: NonZeroU32,
}

impl Cadence {
    pub fn new(tick: Duration, trigger: NonZeroU32) -> Self {
        Cadence { tick, trigger }
    }

    /// 1 s ticks, refresh every 30 ticks.
    pub fn alerts() -> Self {
        Cadence::new(Duration::from_secs(1), NonZeroU32::MIN.saturating_add(29))
    }

    /// 30 s refresh cycle shown as a 5-step countdown.
    pub fn dashboard() -> Self {
        Cadence::new(Duration::from_secs(6), NonZeroU32::MIN.saturating_add(4))
    }

    pub fn period(&self) -> Duration {
        self.tick * self.trigger.get()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Counting(u32),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Counting(u32),
    Fired,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    cadence: Cadence,
    phase: Phase,
}

impl Countdown {
    pub fn new(cadence: Cadence) -> Self {
        Countdown {
            cadence,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn start(&mut self) -> u32 {
        let n = self.cadence.trigger.get();
        self.phase = Phase::Counting(n);
        n
    }

    /// Advance one tick. Starting from `Idle` arms the countdown first.
    pub fn tick(&mut self) -> TickOutcome {
        let current = match self.phase {
            Phase::Idle => self.start(),
            Phase::Counting(n) => n,
        };
        let next = current.saturating_sub(1);
        if next == 0 {
            self.start();
            TickOutcome::Fired
        } else {
            self.phase = Phase::Counting(next);
            TickOutcome::Counting(next)
        }
    }
}

/// Owned by a view; cancels the scheduler when cancelled or dropped.
pub struct PollHandle {
    cancelled: Rc<Cell<bool>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancelled.set(true);
    }
}

pub struct PollingScheduler {
    cadence: Cadence,
    countdown: RefCell<Countdown>,
    remaining: Observable<u32>,
    current: Cell<u32>,
    fired: Cell<u64>,
    cancelled: Rc<Cell<bool>>,
}

impl PollingScheduler {
    /// Create a scheduler and the handle that controls its lifetime.
    pub fn new(cadence: Cadence) -> (Self, PollHandle) {
        let cancelled = Rc::new(Cell::new(false));
        let mut countdown = Countdown::new(cadence);
        let start = countdown.start();
        let scheduler = PollingScheduler {
            cadence,
            countdown: RefCell::new(countdown),
            remaining: Observable::new(),
            current: Cell::new(start),
            fired: Cell::new(0),
            cancelled: Rc::clone(&cancelled),
        };
        (scheduler, PollHandle { cancelled })
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub fn remaining(&self) -> u32 {
        self.current.get()
    }

    pub fn fire_count(&self) -> u64 {
        self.fired.get()
    }

    pub fn label(&self) -> String {
        let secs = self.cadence.tick.as_secs() * u64::from(self.current.get());
        format!("Next refresh in {}s", secs)
    }

    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn on_countdown(&self, listener: impl Fn(&u32) + 'static) -> Subscription {
        self.remaining.subscribe(listener)
    }

    fn set_remaining(&self, n: u32) {
        self.current.set(n);
        self.remaining.emit(&n);
    }

    /// One tick, without sleeping. After cancellation this is a no-op.
    pub fn tick(&self, refresh: &mut dyn FnMut()) -> TickOutcome {
        if self.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        let outcome = self.countdown.borrow_mut().tick();
        match outcome {
            TickOutcome::Counting(n) => self.set_remaining(n),
            TickOutcome::Fired => {
                self.set_remaining(0);
                self.fired.set(self.fired.get() + 1);
                debug!("Polling: refresh #{} fired", self.fired.get());
                refresh();
                if self.is_cancelled() {
                    return TickOutcome::Cancelled;
                }
                self.set_remaining(self.cadence.trigger.get());
            }
            TickOutcome::Cancelled => {}
        }
        outcome
    }

    /// Blocking loop with a steady cadence. Returns once cancelled or after
    /// `max_fires` refreshes.
    pub fn run(&self, max_fires: Option<NonZeroU32>, mut refresh: impl FnMut()) {
        info!(
            "Polling every {}s ({} x {}s ticks)",
            self.cadence.period().as_secs(),
            self.cadence.trigger,
            self.cadence.tick.as_secs()
        );
        let mut deadline = Instant::now() + self.cadence.tick;
        loop {
            // Maintain steady cadence; a slow refresh delays only the next tick
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
            deadline = deadline.max(Instant::now()) + self.cadence.tick;
            if self.tick(&mut refresh) == TickOutcome::Cancelled {
                debug!("Polling cancelled");
                return;
            }
            if let Some(max) = max_fires
                && self.fired.get() >= u64::from(max.get())
            {
                return;
            }
        }
    }
}
