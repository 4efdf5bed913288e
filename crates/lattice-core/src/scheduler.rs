//! Fixed-interval tick loop.
//!
//! One background task fires every `interval` and advances each running
//! world once, sequentially, in registry order. A tick that overruns the
//! interval delays the next firing; ticks never overlap and missed ones are
//! not replayed in a burst.
//!
//! On a multi-threaded runtime the tick body runs under
//! [`tokio::task::block_in_place`]: a generation step over a large grid is
//! CPU-bound and holds the world's lock, so other tasks are moved off the
//! worker for its duration.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::lock;
use crate::registry::WorldRegistry;

/// Shortest interval the scheduler will run at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Worlds that advanced a generation.
    pub advanced: usize,
    /// Worlds that stopped themselves on this tick.
    pub stopped: usize,
}

/// Drives every running world of a registry on a fixed interval.
#[derive(Debug)]
pub struct Scheduler {
    registry: Arc<WorldRegistry>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a stopped scheduler. A zero interval is raised to one
    /// millisecond.
    pub fn new(registry: Arc<WorldRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval: interval.max(MIN_INTERVAL),
            task: Mutex::new(None),
        }
    }

    /// The tick interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. Calling this while already running cancels the
    /// previous loop first, so at most one loop is ever active.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let registry = Arc::clone(&self.registry);
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the first generation
            // belongs one full interval after start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = run_tick(&registry);
                if report.advanced > 0 {
                    trace!(advanced = report.advanced, stopped = report.stopped, "tick");
                }
            }
        });

        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
            debug!("scheduler restarted");
        } else {
            let interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
            info!(interval_ms, "scheduler started");
        }
    }

    /// Stop ticking. A no-op if not running.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
            info!("scheduler stopped");
        }
    }

    /// Whether the tick loop is active.
    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one tick immediately, outside the timer.
    pub fn tick(&self) -> TickReport {
        tick_worlds(&self.registry)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

/// Tick from inside the runtime, off the async worker where possible.
fn run_tick(registry: &WorldRegistry) -> TickReport {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| tick_worlds(registry)),
        _ => tick_worlds(registry),
    }
}

fn tick_worlds(registry: &WorldRegistry) -> TickReport {
    let mut report = TickReport::default();
    for world in registry.list() {
        if let Some(advance) = world.advance() {
            report.advanced = report.advanced.saturating_add(1);
            if advance.stopped {
                report.stopped = report.stopped.saturating_add(1);
            }
        }
    }
    report
}
