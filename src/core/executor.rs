//! Phase execution engine.
//!
//! One `run` drives a single phase through its state machine:
//! Idle -> Running -> {Success, Degraded, Failed} -> Idle.
//! Gateway errors are classified here and never escape; callers only ever
//! observe a [`PhaseRun`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    Freshness, InputRecord, PhaseErrorKind, PhaseName, PhaseOutcome, PhaseRun, StoredArtifact,
};
use crate::gateway::{GatewayError, UpstreamGateway};
use crate::store::ArtifactStore;

use super::{assembler, phases};

/// Result of asking the executor to run a phase
#[derive(Debug)]
pub enum TriggerResult {
    /// The phase was already running; the trigger was a no-op
    AlreadyRunning,

    /// The run reached a terminal outcome
    Finished(PhaseRun),
}

/// Output of a phase body that is ready to be written
pub(crate) struct BodyOutput {
    pub payload: serde_json::Value,
    /// True when a fallback produced the payload (degrades the outcome)
    pub fell_back: bool,
}

/// A classified phase-body failure; no artifact is written
pub(crate) struct PhaseFailure {
    pub kind: PhaseErrorKind,
    pub message: String,
}

impl PhaseFailure {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: PhaseErrorKind::Internal,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for PhaseFailure {
    fn from(e: GatewayError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Input artifacts read at the start of a run, with observed freshness
pub(crate) struct InputSet {
    entries: Vec<InputEntry>,
}

struct InputEntry {
    key: &'static str,
    required: bool,
    artifact: Option<StoredArtifact>,
    freshness: Freshness,
}

impl InputSet {
    pub fn payload(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.artifact.as_ref())
            .map(|a| &a.payload)
    }

    pub fn freshness(&self, key: &str) -> Freshness {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.freshness)
            .unwrap_or(Freshness::Missing)
    }

    fn records(&self) -> Vec<InputRecord> {
        self.entries
            .iter()
            .map(|e| InputRecord {
                key: e.key.to_string(),
                freshness: e.freshness,
            })
            .collect()
    }

    fn missing_required(&self) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.required && e.freshness == Freshness::Missing)
            .map(|e| e.key)
    }

    fn any_required_stale(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.required && e.freshness == Freshness::Stale)
    }
}

/// Runs phases against the store and gateway, enforcing the
/// at-most-one-concurrent-execution-per-phase invariant.
pub struct PhaseExecutor {
    store: Arc<ArtifactStore>,
    gateway: Arc<dyn UpstreamGateway>,
    config: Arc<EngineConfig>,
    guards: HashMap<PhaseName, Arc<Mutex<()>>>,
}

impl PhaseExecutor {
    pub fn new(
        store: Arc<ArtifactStore>,
        gateway: Arc<dyn UpstreamGateway>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let guards = PhaseName::ALL
            .iter()
            .map(|p| (*p, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            store,
            gateway,
            config,
            guards,
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    /// Whether a run for `phase` is currently in flight
    pub fn is_running(&self, phase: PhaseName) -> bool {
        self.guards[&phase].try_lock().is_err()
    }

    /// Execute one run of `phase`.
    ///
    /// A phase already running rejects the trigger with a no-op. The whole
    /// run is bounded by the phase's wall-clock budget; on timeout the run is
    /// abandoned, marked failed, and the guard is released.
    #[instrument(skip(self), fields(phase = %phase))]
    pub async fn run(&self, phase: PhaseName) -> TriggerResult {
        let _guard = match self.guards[&phase].clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                info!("phase already running, trigger coalesced");
                return TriggerResult::AlreadyRunning;
            }
        };

        let started_at = Utc::now();
        let run = match self.run_guarded(phase, started_at).await {
            Ok(run) => run,
            Err(failure) => {
                // Store I/O problems and the like: the run fails, the
                // previous artifact stays untouched.
                error!(error = %failure.message, "phase run failed internally");
                self.terminal_run(phase, started_at, Vec::new(), PhaseOutcome::Failed, Some(failure))
            }
        };

        if let Err(e) = self.store.append_run(&run).await {
            warn!(error = %e, "failed to record phase run");
        }

        info!(outcome = %run.outcome, "phase run finished");
        TriggerResult::Finished(run)
    }

    async fn run_guarded(
        &self,
        phase: PhaseName,
        started_at: DateTime<Utc>,
    ) -> Result<PhaseRun, PhaseFailure> {
        let inputs = self.read_inputs(phase, started_at).await?;

        // A required input that was never produced fails the run outright;
        // stale-but-present is preferable to absent, so nothing is written.
        if let Some(key) = inputs.missing_required() {
            return Ok(self.terminal_run(
                phase,
                started_at,
                inputs.records(),
                PhaseOutcome::Failed,
                Some(PhaseFailure {
                    kind: PhaseErrorKind::MissingRequiredInput,
                    message: format!("required input {} never produced", key),
                }),
            ));
        }

        let budget = self.config.phase(phase).timeout();
        let body = self.execute_body(phase, &inputs, started_at);

        let run = match tokio::time::timeout(budget, body).await {
            Err(_) => {
                // Abandoned in-flight upstream calls are dropped best-effort
                warn!(budget_secs = budget.as_secs(), "phase run exceeded wall-clock budget");
                self.terminal_run(
                    phase,
                    started_at,
                    inputs.records(),
                    PhaseOutcome::Failed,
                    Some(PhaseFailure {
                        kind: PhaseErrorKind::PhaseTimeout,
                        message: format!("run exceeded {}s budget", budget.as_secs()),
                    }),
                )
            }
            Ok(Err(failure)) => self.terminal_run(
                phase,
                started_at,
                inputs.records(),
                PhaseOutcome::Failed,
                Some(failure),
            ),
            Ok(Ok(output)) => {
                let ttl = self.config.phase(phase).ttl();
                self.store
                    .put(phase.artifact_key(), output.payload, ttl)
                    .await
                    .map_err(|e| PhaseFailure::internal(e.to_string()))?;

                let outcome = if output.fell_back || inputs.any_required_stale() {
                    PhaseOutcome::Degraded
                } else {
                    PhaseOutcome::Success
                };
                self.terminal_run(phase, started_at, inputs.records(), outcome, None)
            }
        };

        Ok(run)
    }

    async fn read_inputs(
        &self,
        phase: PhaseName,
        now: DateTime<Utc>,
    ) -> Result<InputSet, PhaseFailure> {
        let mut entries = Vec::new();

        let keys = phase
            .required_inputs()
            .iter()
            .map(|k| (*k, true))
            .chain(phase.optional_inputs().iter().map(|k| (*k, false)));

        for (key, required) in keys {
            let (artifact, freshness) = self
                .store
                .read_input(key, now)
                .await
                .map_err(|e| PhaseFailure::internal(e.to_string()))?;

            entries.push(InputEntry {
                key,
                required,
                artifact,
                freshness,
            });
        }

        Ok(InputSet { entries })
    }

    async fn execute_body(
        &self,
        phase: PhaseName,
        inputs: &InputSet,
        now: DateTime<Utc>,
    ) -> Result<BodyOutput, PhaseFailure> {
        match phase {
            PhaseName::IndicesFetch => phases::fetch_indices(&*self.gateway, &self.config).await,
            PhaseName::NewsFetch => phases::fetch_news(&*self.gateway, &self.config).await,
            PhaseName::NewsAnalyze => phases::analyze_news(&*self.gateway, inputs).await,
            PhaseName::SnapshotAssemble => {
                assembler::assemble(&*self.gateway, inputs, now).await
            }
        }
    }

    fn terminal_run(
        &self,
        phase: PhaseName,
        started_at: DateTime<Utc>,
        inputs_used: Vec<InputRecord>,
        outcome: PhaseOutcome,
        failure: Option<PhaseFailure>,
    ) -> PhaseRun {
        PhaseRun {
            id: Uuid::new_v4(),
            phase,
            started_at,
            finished_at: Utc::now(),
            outcome,
            error_kind: failure.as_ref().map(|f| f.kind),
            error_detail: failure.map(|f| f.message),
            inputs_used,
        }
    }
}
