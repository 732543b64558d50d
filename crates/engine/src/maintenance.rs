//! Background dictionary sweeping
//!
//! [`MaintenanceTask`] runs [`PlanBStore::sweep_all`] on a fixed interval
//! in its own thread. Shutdown is cooperative: the shutdown signal is also
//! the sweep's cancellation, so a sweep in progress aborts without deleting
//! and the thread exits at its next check.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use planb_core::{Cancellation, Error};

use crate::store::PlanBStore;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Periodic sweep of every registered shape.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(PlanBStore::open(dir)?);
/// let task = MaintenanceTask::new(Arc::clone(&store), Duration::from_secs(600));
/// let handle = task.start();
///
/// // ... use the store ...
///
/// task.shutdown();
/// handle.join().unwrap();
/// ```
pub struct MaintenanceTask {
    store: Arc<PlanBStore>,
    interval: Duration,
    shutdown: Cancellation,
}

impl MaintenanceTask {
    /// Task sweeping `store` every `interval`.
    pub fn new(store: Arc<PlanBStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            shutdown: Cancellation::new(),
        }
    }

    /// Task configured by the store's `[maintenance]` section, if enabled.
    pub fn from_config(store: Arc<PlanBStore>) -> Option<Self> {
        let maintenance = store.config().maintenance.clone();
        maintenance
            .enabled
            .then(|| Self::new(store, maintenance.interval()))
    }

    /// Sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one pass over every shape now. Returns the number of dictionary
    /// entries deleted.
    pub fn run_once(&self) -> u64 {
        let mut deleted = 0;
        for (shape, result) in self.store.sweep_all(&self.shutdown) {
            match result {
                Ok(stats) => {
                    debug!(
                        target: "planb::maintenance",
                        shape = %shape,
                        deleted = stats.deleted,
                        "Swept shape"
                    );
                    deleted += stats.deleted;
                }
                Err(Error::Cancelled) => {
                    debug!(
                        target: "planb::maintenance",
                        shape = %shape,
                        "Sweep interrupted by shutdown"
                    );
                }
                Err(e) => {
                    error!(
                        target: "planb::maintenance",
                        shape = %shape,
                        error = %e,
                        "Sweep failed"
                    );
                }
            }
        }
        deleted
    }

    /// Start the background thread.
    ///
    /// The first pass runs one interval after start. The thread runs until
    /// [`MaintenanceTask::shutdown`] is called.
    pub fn start(&self) -> JoinHandle<()> {
        let task = MaintenanceTask {
            store: Arc::clone(&self.store),
            interval: self.interval,
            shutdown: self.shutdown.clone(),
        };

        thread::spawn(move || {
            info!(
                target: "planb::maintenance",
                interval_ms = task.interval.as_millis() as u64,
                "Maintenance started"
            );
            while !task.is_shutdown() {
                let step = SHUTDOWN_POLL.min(task.interval);
                let mut waited = Duration::ZERO;
                while waited < task.interval {
                    if task.is_shutdown() {
                        info!(target: "planb::maintenance", "Maintenance stopped");
                        return;
                    }
                    thread::sleep(step);
                    waited += step;
                }
                task.run_once();
            }
            info!(target: "planb::maintenance", "Maintenance stopped");
        })
    }

    /// Signal shutdown. A sweep in progress is cancelled.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
