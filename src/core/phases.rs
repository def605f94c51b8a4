//! Producer phase bodies: indices.fetch, news.fetch, news.analyze.
//!
//! Each body is pure transformation around gateway calls; the executor owns
//! input reading, artifact writing, and outcome classification.

use std::collections::HashMap;

use tracing::warn;

use crate::config::EngineConfig;
use crate::domain::market::{self, AnalyzedNews, IndicesArtifact, NewsProcessedArtifact, NewsRawArtifact};
use crate::domain::{keys, MarketOutlook, Momentum, Sentiment};
use crate::gateway::{
    InferenceRequest, NewsAnalysisResponse, ResponseSchema, UpstreamGateway,
};

use super::executor::{BodyOutput, PhaseFailure};

const NEWS_ANALYSIS_SYSTEM: &str = "You classify Indian market news. For each item return sentiment \
(bullish/bearish/neutral), an optional canonical theme, and a one-line causal note. \
Respond with a single JSON object: {\"assessments\": [{\"news_id\", \"sentiment\", \"theme\", \"causal_note\"}]}.";

/// indices.fetch: pull quotes, derive outlook and momentum from the benchmark
pub(crate) async fn fetch_indices(
    gateway: &dyn UpstreamGateway,
    config: &EngineConfig,
) -> Result<BodyOutput, PhaseFailure> {
    let quotes = gateway.fetch_indices(&config.indices).await?;

    let benchmark = quotes
        .iter()
        .find(|q| q.symbol == config.benchmark_index)
        .or_else(|| quotes.first())
        .ok_or_else(|| PhaseFailure::from(crate::gateway::GatewayError::MalformedResponse(
            "provider returned no indices".to_string(),
        )))?;

    let artifact = IndicesArtifact {
        benchmark_symbol: benchmark.symbol.clone(),
        outlook: MarketOutlook::from_change_percent(benchmark.change_percent),
        momentum: Momentum::from_change_percent(benchmark.change_percent),
        indices: quotes.clone(),
    };

    Ok(BodyOutput {
        payload: serde_json::to_value(&artifact)
            .map_err(|e| PhaseFailure::internal(e.to_string()))?,
        fell_back: false,
    })
}

/// news.fetch: pull raw news items
pub(crate) async fn fetch_news(
    gateway: &dyn UpstreamGateway,
    config: &EngineConfig,
) -> Result<BodyOutput, PhaseFailure> {
    let items = gateway.fetch_news(config.news_limit).await?;
    let artifact = NewsRawArtifact { items };

    Ok(BodyOutput {
        payload: serde_json::to_value(&artifact)
            .map_err(|e| PhaseFailure::internal(e.to_string()))?,
        fell_back: false,
    })
}

/// news.analyze: annotate raw news via the model, falling back to the
/// deterministic keyword mapping when inference fails after retries.
pub(crate) async fn analyze_news(
    gateway: &dyn UpstreamGateway,
    inputs: &super::executor::InputSet,
) -> Result<BodyOutput, PhaseFailure> {
    let raw: NewsRawArtifact = inputs
        .payload(keys::NEWS_RAW)
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| PhaseFailure::internal(format!("corrupt news.raw payload: {}", e)))?
        .unwrap_or(NewsRawArtifact { items: Vec::new() });

    if raw.items.is_empty() {
        let artifact = NewsProcessedArtifact {
            items: Vec::new(),
            keyword_fallback: false,
        };
        return Ok(BodyOutput {
            payload: serde_json::to_value(&artifact)
                .map_err(|e| PhaseFailure::internal(e.to_string()))?,
            fell_back: false,
        });
    }

    let request = InferenceRequest {
        system: NEWS_ANALYSIS_SYSTEM.to_string(),
        prompt: serde_json::to_string(&raw.items)
            .map_err(|e| PhaseFailure::internal(e.to_string()))?,
        schema: ResponseSchema::NewsAnalysis,
    };

    let (artifact, fell_back) = match gateway.infer(request).await {
        Ok(value) => {
            // Already schema-validated by the gateway
            let response: NewsAnalysisResponse = serde_json::from_value(value)
                .map_err(|e| PhaseFailure::internal(e.to_string()))?;
            (merge_assessments(&raw, response), false)
        }
        Err(e) => {
            warn!(error = %e, "news analysis inference failed, using keyword fallback");
            (keyword_fallback(&raw), true)
        }
    };

    Ok(BodyOutput {
        payload: serde_json::to_value(&artifact)
            .map_err(|e| PhaseFailure::internal(e.to_string()))?,
        fell_back,
    })
}

/// Join model assessments back onto the raw items by news id. Items the model
/// skipped keep a neutral annotation; themes outside the canonical list are
/// dropped.
fn merge_assessments(raw: &NewsRawArtifact, response: NewsAnalysisResponse) -> NewsProcessedArtifact {
    let mut by_id: HashMap<&str, _> = response
        .assessments
        .iter()
        .map(|a| (a.news_id.as_str(), a))
        .collect();

    let items = raw
        .items
        .iter()
        .map(|item| match by_id.remove(item.id.as_str()) {
            Some(assessment) => AnalyzedNews {
                item: item.clone(),
                sentiment: assessment.sentiment,
                theme: assessment
                    .theme
                    .as_deref()
                    .filter(|t| market::ALLOWED_THEMES.contains(t))
                    .map(String::from),
                causal_note: assessment.causal_note.clone(),
            },
            None => AnalyzedNews {
                item: item.clone(),
                sentiment: Sentiment::Neutral,
                theme: None,
                causal_note: String::new(),
            },
        })
        .collect();

    NewsProcessedArtifact {
        items,
        keyword_fallback: false,
    }
}

/// Minimal deterministic annotation when the model is unavailable
fn keyword_fallback(raw: &NewsRawArtifact) -> NewsProcessedArtifact {
    let items = raw
        .items
        .iter()
        .map(|item| {
            let text = format!("{} {}", item.headline, item.summary);
            AnalyzedNews {
                item: item.clone(),
                sentiment: Sentiment::Neutral,
                theme: market::theme_for_text(&text).map(String::from),
                causal_note: String::new(),
            }
        })
        .collect();

    NewsProcessedArtifact {
        items,
        keyword_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewsItem;
    use chrono::Utc;

    fn item(id: &str, headline: &str) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            headline: headline.to_string(),
            summary: String::new(),
            source: "wire".to_string(),
            published_at: Utc::now(),
            is_breaking: false,
        }
    }

    #[test]
    fn test_keyword_fallback_maps_themes() {
        let raw = NewsRawArtifact {
            items: vec![
                item("n1", "RBI surprises with repo rate cut"),
                item("n2", "Unrelated corporate filing"),
            ],
        };

        let out = keyword_fallback(&raw);

        assert!(out.keyword_fallback);
        assert_eq!(out.items[0].theme.as_deref(), Some("RBI & Interest Rates"));
        assert_eq!(out.items[0].sentiment, Sentiment::Neutral);
        assert!(out.items[1].theme.is_none());
    }

    #[test]
    fn test_merge_drops_non_canonical_themes() {
        let raw = NewsRawArtifact {
            items: vec![item("n1", "Banks rally")],
        };
        let response: NewsAnalysisResponse = serde_json::from_value(serde_json::json!({
            "assessments": [
                {"news_id": "n1", "sentiment": "bullish", "theme": "Made Up Theme", "causal_note": "x"}
            ]
        }))
        .unwrap();

        let out = merge_assessments(&raw, response);

        assert_eq!(out.items[0].sentiment, Sentiment::Bullish);
        assert!(out.items[0].theme.is_none());
    }

    #[test]
    fn test_merge_defaults_unassessed_items_to_neutral() {
        let raw = NewsRawArtifact {
            items: vec![item("n1", "a"), item("n2", "b")],
        };
        let response: NewsAnalysisResponse = serde_json::from_value(serde_json::json!({
            "assessments": [
                {"news_id": "n1", "sentiment": "bearish"}
            ]
        }))
        .unwrap();

        let out = merge_assessments(&raw, response);

        assert_eq!(out.items[0].sentiment, Sentiment::Bearish);
        assert_eq!(out.items[1].sentiment, Sentiment::Neutral);
    }
}
