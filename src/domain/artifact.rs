//! Stored artifacts and the advisory freshness model.
//!
//! An artifact is immutable once written; producing a new value for the same
//! key overwrites the previous version. Staleness is derived at read time and
//! never stored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Artifact keys, one per producing phase.
pub mod keys {
    /// Latest index quotes plus derived outlook (owned by indices.fetch)
    pub const INDICES_LATEST: &str = "indices.latest";

    /// Raw news items as fetched (owned by news.fetch)
    pub const NEWS_RAW: &str = "news.raw";

    /// Sentiment/theme-annotated news (owned by news.analyze)
    pub const NEWS_PROCESSED: &str = "news.processed";

    /// The composite snapshot served to readers (owned by snapshot.assemble)
    pub const SNAPSHOT_COMPOSITE: &str = "snapshot.composite";

    /// Watchlist/holdings impact analysis, written by an external
    /// personalization service. No pipeline phase owns this key; the
    /// assembler merges it when present.
    pub const PORTFOLIO_IMPACT: &str = "portfolio.impact";
}

/// One stored artifact document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Stable identifier of the artifact kind
    pub key: String,

    /// Opaque structured value, schema owned by the producing phase
    pub payload: serde_json::Value,

    /// Timestamp of the successful write
    pub produced_at: DateTime<Utc>,

    /// `produced_at + ttl`; past this the artifact is stale but still readable
    pub expires_at: DateTime<Utc>,

    /// Content fingerprint of the payload (first 16 hex chars of SHA-256)
    pub payload_hash: String,
}

impl StoredArtifact {
    /// Create a new artifact version produced now
    pub fn new(key: impl Into<String>, payload: serde_json::Value, ttl: Duration) -> Self {
        let produced_at = Utc::now();
        Self {
            key: key.into(),
            payload_hash: payload_hash(&payload),
            expires_at: produced_at + ttl,
            produced_at,
            payload,
        }
    }

    /// Advisory freshness of this artifact at `now`
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        if now > self.expires_at {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

/// Freshness of an artifact at read time.
///
/// Advisory only: a stale artifact remains readable until the store's
/// hard-retention sweep evicts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale,
    Missing,
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Missing => "missing",
        };
        f.write_str(s)
    }
}

/// Hash a payload for change detection (first 16 hex chars of SHA-256)
pub fn payload_hash(payload: &serde_json::Value) -> String {
    let canonical = payload.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}
