//! Read-only status projection over the run log and artifact metadata.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Freshness, PhaseName, PhaseOutcome};
use crate::store::ArtifactStore;

/// Per-phase view for the status surface
#[derive(Debug, Serialize)]
pub struct PhaseStatus {
    pub phase: PhaseName,
    pub last_outcome: Option<PhaseOutcome>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub artifact_freshness: Freshness,
}

/// Project the last run outcome and artifact freshness for every phase
pub async fn status_report(store: &ArtifactStore, now: DateTime<Utc>) -> Result<Vec<PhaseStatus>> {
    let mut report = Vec::with_capacity(PhaseName::ALL.len());

    for phase in PhaseName::ALL {
        let last = store.last_run(phase).await?;
        let freshness = store.status(phase.artifact_key(), now).await?;

        report.push(PhaseStatus {
            phase,
            last_outcome: last.as_ref().map(|r| r.outcome),
            last_finished_at: last.map(|r| r.finished_at),
            artifact_freshness: freshness,
        });
    }

    Ok(report)
}
