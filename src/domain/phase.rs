//! Phase identities, execution records, and outcomes.
//!
//! The pipeline is a closed set of phases, each owning exactly one artifact
//! key and running on its own cadence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{keys, Freshness};

/// The closed set of pipeline phases, in bootstrap (dependency) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseName {
    /// Fetch index quotes and derive the market outlook
    #[serde(rename = "indices.fetch")]
    IndicesFetch,

    /// Fetch raw news items from the provider
    #[serde(rename = "news.fetch")]
    NewsFetch,

    /// Annotate raw news with sentiment and themes (AI call)
    #[serde(rename = "news.analyze")]
    NewsAnalyze,

    /// Compose the served snapshot from the freshest available artifacts
    #[serde(rename = "snapshot.assemble")]
    SnapshotAssemble,
}

impl PhaseName {
    /// All phases in dependency order; also the bootstrap trigger order.
    pub const ALL: [PhaseName; 4] = [
        PhaseName::IndicesFetch,
        PhaseName::NewsFetch,
        PhaseName::NewsAnalyze,
        PhaseName::SnapshotAssemble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::IndicesFetch => "indices.fetch",
            PhaseName::NewsFetch => "news.fetch",
            PhaseName::NewsAnalyze => "news.analyze",
            PhaseName::SnapshotAssemble => "snapshot.assemble",
        }
    }

    /// The artifact key this phase writes
    pub fn artifact_key(&self) -> &'static str {
        match self {
            PhaseName::IndicesFetch => keys::INDICES_LATEST,
            PhaseName::NewsFetch => keys::NEWS_RAW,
            PhaseName::NewsAnalyze => keys::NEWS_PROCESSED,
            PhaseName::SnapshotAssemble => keys::SNAPSHOT_COMPOSITE,
        }
    }

    /// Inputs that must exist for the phase to run at all.
    /// A missing required input fails the run without touching the store.
    pub fn required_inputs(&self) -> &'static [&'static str] {
        match self {
            PhaseName::NewsAnalyze => &[keys::NEWS_RAW],
            _ => &[],
        }
    }

    /// Inputs the phase reads when present but tolerates missing.
    /// The assembler degrades per-input instead of failing.
    pub fn optional_inputs(&self) -> &'static [&'static str] {
        match self {
            PhaseName::SnapshotAssemble => &[
                keys::INDICES_LATEST,
                keys::NEWS_PROCESSED,
                keys::PORTFOLIO_IMPACT,
            ],
            _ => &[],
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseName::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase: {}", s))
    }
}

/// One execution attempt of a phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRun {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Which phase was executed
    pub phase: PhaseName,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Terminal outcome of the run
    pub outcome: PhaseOutcome,

    /// Classified error, if the run degraded or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<PhaseErrorKind>,

    /// Human-readable error detail (no secrets)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Input artifact keys read by this run and their freshness at read time
    pub inputs_used: Vec<InputRecord>,
}

/// An input artifact as observed at the start of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRecord {
    pub key: String,
    pub freshness: Freshness,
}

/// Terminal outcome of a phase run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// Artifact written, all inputs fresh, no fallback used
    Success,

    /// Artifact written, but an input was stale or a fallback kicked in
    Degraded,

    /// No artifact written; the previous version (if any) is left untouched
    Failed,
}

impl std::fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseOutcome::Success => "success",
            PhaseOutcome::Degraded => "degraded",
            PhaseOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Classified causes for degraded or failed runs.
///
/// Gateway errors are classified inside the executor; the scheduler only
/// ever observes a [`PhaseRun`], never a raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseErrorKind {
    UpstreamTimeout,
    UpstreamRateLimited,
    UpstreamUnavailable,
    MalformedResponse,
    MissingRequiredInput,
    PhaseTimeout,
    /// Store I/O or payload decoding problem local to the engine
    Internal,
}
