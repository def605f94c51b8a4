//! Market domain payloads: index quotes, outlook, news, themes.
//!
//! These are the schemas of the artifacts each phase produces. Every payload
//! is plain serde data; no behavior beyond derivation helpers.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Max number of themed news items carried into the snapshot
pub const MAX_THEMED_NEWS_ITEMS: usize = 5;

/// Max number of summary bullets carried into the snapshot
pub const MAX_SUMMARY_BULLETS: usize = 5;

/// One index quote as fetched from the market data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    /// Display symbol, e.g. "NIFTY 50" or "SENSEX"
    pub symbol: String,
    pub last_price: f64,
    pub change_percent: f64,
    pub as_of: DateTime<Utc>,
}

/// Sentiment classification for news
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Market direction derived from the benchmark index move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketOutlook {
    Bullish,
    Bearish,
    Neutral,
}

impl MarketOutlook {
    /// Bullish above +0.5%, bearish below -0.5%, neutral between
    pub fn from_change_percent(pct: f64) -> Self {
        if pct > 0.5 {
            MarketOutlook::Bullish
        } else if pct < -0.5 {
            MarketOutlook::Bearish
        } else {
            MarketOutlook::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketOutlook::Bullish => "bullish",
            MarketOutlook::Bearish => "bearish",
            MarketOutlook::Neutral => "neutral",
        }
    }
}

/// Magnitude of the benchmark move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Momentum {
    StrongUp,
    ModerateUp,
    Sideways,
    ModerateDown,
    StrongDown,
}

impl Momentum {
    pub fn from_change_percent(pct: f64) -> Self {
        match pct {
            p if p > 1.0 => Momentum::StrongUp,
            p if p > 0.25 => Momentum::ModerateUp,
            p if p < -1.0 => Momentum::StrongDown,
            p if p < -0.25 => Momentum::ModerateDown,
            _ => Momentum::Sideways,
        }
    }
}

/// Trading-day phase derived from IST wall-clock time.
///
/// Pre-market 08:00-09:15, mid-market 09:15-15:30, post-market otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPhase {
    Pre,
    Mid,
    Post,
}

impl MarketPhase {
    pub fn from_utc(now: DateTime<Utc>) -> Self {
        // IST is UTC+05:30 with no DST
        let ist_offset = FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("fixed IST offset");
        let ist = now.with_timezone(&ist_offset);
        let minutes = ist.hour() * 60 + ist.minute();

        match minutes {
            480..=554 => MarketPhase::Pre,  // 08:00 - 09:14
            555..=929 => MarketPhase::Mid,  // 09:15 - 15:29
            _ => MarketPhase::Post,
        }
    }
}

/// A raw news item as returned by the news provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub headline: String,
    pub summary: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub is_breaking: bool,
}

/// A news item annotated by the analysis phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedNews {
    #[serde(flatten)]
    pub item: NewsItem,
    pub sentiment: Sentiment,
    /// Canonical theme, if one applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// One-line causal explanation of the expected market impact
    #[serde(default)]
    pub causal_note: String,
}

/// Payload written by indices.fetch under `indices.latest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicesArtifact {
    pub indices: Vec<IndexQuote>,
    pub benchmark_symbol: String,
    pub outlook: MarketOutlook,
    pub momentum: Momentum,
}

/// Payload written by news.fetch under `news.raw`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsRawArtifact {
    pub items: Vec<NewsItem>,
}

/// Payload written by news.analyze under `news.processed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsProcessedArtifact {
    pub items: Vec<AnalyzedNews>,
    /// True when the keyword fallback produced the annotations instead of the model
    #[serde(default)]
    pub keyword_fallback: bool,
}

/// Canonical theme names for themed news (exact display strings)
pub const ALLOWED_THEMES: &[&str] = &[
    // Sector-driven
    "Banking & Financials",
    "Information Technology (IT)",
    "Oil, Gas & Energy",
    "FMCG & Consumer Staples",
    "Consumer Discretionary",
    "Automobiles & Auto Ancillaries",
    "Pharma & Healthcare",
    "Metals & Mining",
    "Infrastructure & Capital Goods",
    "Real Estate",
    // Macro / flow-driven
    "Global Market Cues",
    "RBI & Interest Rates",
    "Commodities & Crude Prices",
    "FII & DII Flows",
    // Structural / emerging
    "EV, Green Energy & New-Age Themes",
];

/// Keyword groups for the deterministic theme fallback, checked in order.
/// Matching is case-insensitive substring over headline + summary.
const THEME_KEYWORDS: &[(&[&str], &str)] = &[
    (&["bank", "nbfc", "financial", "insurer", "lending"], "Banking & Financials"),
    (&["information technology", "software", "tech "], "Information Technology (IT)"),
    (&["oil", "gas", "energy", "power"], "Oil, Gas & Energy"),
    (&["fmcg", "consumer staples"], "FMCG & Consumer Staples"),
    (&["retail", "durables", "discretionary"], "Consumer Discretionary"),
    (&["auto", "automobile", "vehicle"], "Automobiles & Auto Ancillaries"),
    (&["pharma", "healthcare", "hospital", "drug"], "Pharma & Healthcare"),
    (&["metal", "mining", "steel", "aluminium"], "Metals & Mining"),
    (&["infrastructure", "capital goods", "construction"], "Infrastructure & Capital Goods"),
    (&["real estate", "realty", "housing"], "Real Estate"),
    (&["rbi", "interest rate", "repo", "inflation"], "RBI & Interest Rates"),
    (&["crude", "commodit", "gold", "forex"], "Commodities & Crude Prices"),
    (&["fii", "dii", "inflow", "outflow"], "FII & DII Flows"),
    (&["ev ", "electric vehicle", "green energy", "renewable"], "EV, Green Energy & New-Age Themes"),
    (&["global", "fed ", "wall street", "asian market"], "Global Market Cues"),
];

/// Map free text to a canonical theme, if any keyword group matches
pub fn theme_for_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    THEME_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, theme)| *theme)
}
