//! Portfolio/watchlist impact payloads.
//!
//! Produced outside the pipeline by a personalization service and stored
//! under `portfolio.impact`; assembly merges it into the snapshot when the
//! artifact exists and tolerates its absence.

use serde::{Deserialize, Serialize};

/// Payload stored under `portfolio.impact`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioImpactArtifact {
    /// Watchlist symbols with potential impact from current news
    #[serde(default)]
    pub watchlist_impacted: Vec<String>,

    #[serde(default)]
    pub watchlist_alerts: Vec<WatchlistAlert>,

    /// Free-text summary of the aggregate portfolio impact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_sentiment: Option<PortfolioSentiment>,
}

/// One actionable alert for a watchlist symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistAlert {
    pub symbol: String,
    pub alert_type: AlertType,
    /// One-line causal note explaining the alert
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Positive news suggesting a potential entry
    Opportunity,
    /// Negative news requiring attention
    Risk,
    /// Neutral update worth monitoring
    Informational,
}

/// Aggregate sentiment across the user's holdings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioSentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}
