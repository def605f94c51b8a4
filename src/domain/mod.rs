//! Domain types for the marketpulse engine.
//!
//! - Artifact: key-addressed produced values with a freshness TTL
//! - Phase: identities, runs, and outcomes of pipeline work
//! - Market: index/news payload schemas owned by the producing phases
//! - Portfolio: externally supplied watchlist/holdings impact payloads
//! - Snapshot: the composite payload served to readers

pub mod artifact;
pub mod market;
pub mod phase;
pub mod portfolio;
pub mod snapshot;

// Re-export commonly used types
pub use artifact::{keys, Freshness, StoredArtifact};
pub use market::{
    AnalyzedNews, IndexQuote, IndicesArtifact, MarketOutlook, MarketPhase, Momentum, NewsItem,
    NewsProcessedArtifact, NewsRawArtifact, Sentiment,
};
pub use phase::{InputRecord, PhaseErrorKind, PhaseName, PhaseOutcome, PhaseRun};
pub use portfolio::{AlertType, PortfolioImpactArtifact, PortfolioSentiment, WatchlistAlert};
pub use snapshot::{
    DegradedReason, OutlookBlock, SnapshotPayload, SummaryBullet, ThemedNewsItem,
};
