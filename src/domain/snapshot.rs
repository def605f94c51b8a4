//! The composite snapshot payload served to readers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::{IndexQuote, MarketOutlook, MarketPhase, Momentum, Sentiment};
use super::portfolio::PortfolioImpactArtifact;

/// Payload stored under `snapshot.composite`.
///
/// Always best-effort: missing or stale inputs shrink the payload and set the
/// honesty flags instead of failing assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub market_phase: MarketPhase,

    /// Omitted entirely when the indices artifact was missing at assembly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlook: Option<OutlookBlock>,

    pub summary_bullets: Vec<SummaryBullet>,
    pub themed_news: Vec<ThemedNewsItem>,

    /// Watchlist/holdings impact, merged when the portfolio artifact exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<PortfolioImpactArtifact>,

    /// Free-text narrative from the model, or the fixed template fallback
    pub narrative: String,

    /// True when any input was stale/missing or a fallback was used
    pub degraded: bool,

    /// Which inputs (or assembly steps) degraded this snapshot
    pub degraded_reasons: BTreeSet<DegradedReason>,

    pub assembled_at: DateTime<Utc>,
}

/// Degradation causes, named by the input or step that degraded.
///
/// A missing portfolio artifact is not a degradation: the input is merged
/// only when present.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// Indices input was stale or missing
    Indices,
    /// News input was stale or missing, or keyword fallback annotated it
    News,
    /// Portfolio input was present but stale
    Portfolio,
    /// Narrative inference failed; the template fallback was used
    Narrative,
}

/// Market direction block built from the indices artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlookBlock {
    pub outlook: MarketOutlook,
    pub momentum: Momentum,
    pub benchmark_symbol: String,
    pub indices: Vec<IndexQuote>,
}

/// One causal summary bullet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryBullet {
    pub text: String,
    pub sentiment: Sentiment,
}

/// One themed news item (canonical themes only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemedNewsItem {
    pub theme: String,
    pub headline: String,
    pub summary: String,
    pub sentiment: Sentiment,
    pub is_breaking: bool,
}
