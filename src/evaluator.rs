//! Lifecycle evaluator: keeps workshop status consistent with the clock.
//!
//! Sweeps the catalog on a fixed interval. The first sweep runs immediately
//! so seeded or backdated schedules settle at startup rather than one
//! interval later.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{error, info};

use crate::scheduler::SharedScheduler;

/// Configuration for the evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Time between sweeps.
    pub tick_interval: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
        }
    }
}

/// The evaluator loop: sweep, sleep, repeat until shutdown.
#[derive(Clone)]
pub struct Evaluator {
    scheduler: SharedScheduler,
    config: EvaluatorConfig,
    shutdown: Arc<Notify>,
}

impl Evaluator {
    pub fn new(scheduler: SharedScheduler, config: EvaluatorConfig) -> Self {
        Self {
            scheduler,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the evaluator to shut down.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run the evaluator loop until shutdown.
    pub async fn run(&self) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            "lifecycle evaluator started"
        );

        loop {
            self.sweep();

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("lifecycle evaluator shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }
        }
    }

    fn sweep(&self) {
        let now = Utc::now();
        let mut scheduler = self.scheduler.lock().unwrap_or_else(|e| e.into_inner());
        match scheduler.tick(now) {
            Ok(events) if !events.is_empty() => {
                info!(transitions = events.len(), "lifecycle sweep applied");
            }
            Ok(_) => {}
            Err(e) => error!("lifecycle sweep failed: {e}"),
        }
    }
}
