//! Per-phase scheduling: one independent timer task per phase, manual
//! triggers, warm start, and the retention sweep.
//!
//! Missed ticks are coalesced, never queued: a phase's timer uses delayed
//! missed-tick behavior, and a manual trigger is a `Notify` permit — at most
//! one pending trigger waits behind a running execution.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::PhaseName;

use super::executor::PhaseExecutor;

/// Immediate answer to a manual trigger; never the phase's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// The phase will run as soon as its task picks up the permit
    Accepted,

    /// A run is in flight; the trigger coalesced behind it
    AlreadyRunning,
}

/// Owns one timer and one pending-trigger slot per phase.
pub struct Scheduler {
    executor: Arc<PhaseExecutor>,
    triggers: HashMap<PhaseName, Arc<Notify>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(executor: Arc<PhaseExecutor>) -> Arc<Self> {
        let triggers = PhaseName::ALL
            .iter()
            .map(|p| (*p, Arc::new(Notify::new())))
            .collect();

        Arc::new(Self {
            executor,
            triggers,
            tasks: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn executor(&self) -> &Arc<PhaseExecutor> {
        &self.executor
    }

    /// Spawn one background task per phase plus the retention sweep.
    pub fn start(self: &Arc<Self>) {
        let config = self.executor.config().clone();
        let mut tasks = self.tasks.lock().expect("scheduler task list poisoned");

        for phase in PhaseName::ALL {
            let executor = self.executor.clone();
            let notify = self.triggers[&phase].clone();
            let interval_period = config.phase(phase).interval();
            let warm_start = config.warm_start;

            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(interval_period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                if !warm_start {
                    // Swallow the immediate first tick; with warm start it
                    // doubles as the store-warming run.
                    interval.tick().await;
                }

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            debug!(phase = %phase, "scheduled tick");
                        }
                        _ = notify.notified() => {
                            debug!(phase = %phase, "manual trigger");
                        }
                    }
                    executor.run(phase).await;
                }
            }));
        }

        // Retention sweep: hard eviction and run-history pruning
        let executor = self.executor.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.sweep_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                interval.tick().await;

                let store = executor.store();
                match store.evict_expired(Utc::now(), config.retention()).await {
                    Ok(evicted) if evicted > 0 => info!(evicted, "retention sweep evicted artifacts"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "retention sweep failed"),
                }
                if let Err(e) = store.prune_runs(config.run_history_keep).await {
                    warn!(error = %e, "run history pruning failed");
                }
            }
        }));

        info!("scheduler started");
    }

    /// Manual trigger for one phase. Returns immediately; idempotent with
    /// the executor's per-phase guard.
    pub fn trigger(&self, phase: PhaseName) -> TriggerStatus {
        let running = self.executor.is_running(phase);
        self.triggers[&phase].notify_one();

        if running {
            TriggerStatus::AlreadyRunning
        } else {
            TriggerStatus::Accepted
        }
    }

    /// Manual trigger for every phase
    pub fn trigger_all(&self) -> Vec<(PhaseName, TriggerStatus)> {
        PhaseName::ALL
            .iter()
            .map(|p| (*p, self.trigger(*p)))
            .collect()
    }

    /// Cold-store bootstrap: run the whole chain once, dependencies first,
    /// in a detached task. Callers are never blocked on completion.
    pub fn bootstrap(&self) {
        let executor = self.executor.clone();

        tokio::spawn(async move {
            info!("bootstrap chain started");
            for phase in PhaseName::ALL {
                executor.run(phase).await;
            }
            info!("bootstrap chain finished");
        });
    }

    /// Abort all background tasks
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().expect("scheduler task list poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
