//! Worker scheduling and the single-flight gate
//!
//! A single compare-and-set flag guards entry to the worker. Trigger
//! sources: the periodic tick and the manual API trigger. Concurrent
//! triggers observe the flag and report `AlreadyRunning` without blocking.

pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::engine::Engine;

/// Result of asking for a worker run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Triggered,
    AlreadyRunning,
}

/// Claim the single-flight gate and spawn a run when it is free
pub fn trigger(engine: &Arc<Engine>) -> TriggerOutcome {
    if engine.try_begin_run() {
        let engine = engine.clone();
        tokio::spawn(worker::run(engine));
        TriggerOutcome::Triggered
    } else {
        TriggerOutcome::AlreadyRunning
    }
}

/// Spawn the periodic tick loop, firing one immediate run when configured
pub fn start_scheduler(engine: Arc<Engine>) -> JoinHandle<()> {
    let period = Duration::from_secs(engine.config.check_interval_hours * 60 * 60);
    let run_on_start = engine.config.run_worker_on_start;

    tokio::spawn(async move {
        info!(
            interval_hours = engine.config.check_interval_hours,
            run_on_start,
            "Scheduler started"
        );

        if run_on_start && trigger(&engine) == TriggerOutcome::AlreadyRunning {
            info!("Worker already running, skipping startup run");
        }

        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately; the startup run is handled above.
        interval.tick().await;

        loop {
            interval.tick().await;
            if trigger(&engine) == TriggerOutcome::AlreadyRunning {
                info!("Worker already running, skipping scheduled run");
            }
        }
    })
}
