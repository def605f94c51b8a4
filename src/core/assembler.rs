//! Snapshot assembly: merge the freshest available artifacts into the
//! composite payload readers consume.
//!
//! The merge is pure; only the final narrative step calls the model. As long
//! as at least one input exists, assembly always writes — a best-effort
//! degraded snapshot beats producing nothing.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::market::{self, IndicesArtifact, NewsProcessedArtifact};
use crate::domain::portfolio::PortfolioImpactArtifact;
use crate::domain::snapshot::{
    DegradedReason, OutlookBlock, SnapshotPayload, SummaryBullet, ThemedNewsItem,
};
use crate::domain::{keys, Freshness, MarketPhase, PhaseErrorKind};
use crate::gateway::{
    InferenceRequest, NarrativeResponse, ResponseSchema, UpstreamGateway,
};

use super::executor::{BodyOutput, InputSet, PhaseFailure};

const NARRATIVE_SYSTEM: &str = "You write a short market narrative for Indian equities from \
structured snapshot data. Two to three sentences, factual, causal where the data supports it. \
Respond with a single JSON object: {\"narrative\": \"...\"}.";

pub(crate) async fn assemble(
    gateway: &dyn UpstreamGateway,
    inputs: &InputSet,
    now: DateTime<Utc>,
) -> Result<BodyOutput, PhaseFailure> {
    let indices_freshness = inputs.freshness(keys::INDICES_LATEST);
    let news_freshness = inputs.freshness(keys::NEWS_PROCESSED);

    // Composing from nothing would serve an empty shell; that is the one
    // case assembly refuses.
    if indices_freshness == Freshness::Missing && news_freshness == Freshness::Missing {
        return Err(PhaseFailure {
            kind: PhaseErrorKind::MissingRequiredInput,
            message: "no producer artifact available to assemble from".to_string(),
        });
    }

    let mut degraded_reasons: BTreeSet<DegradedReason> = BTreeSet::new();

    // Indices: use stale data rather than blocking; omit the block if absent
    let outlook = match inputs.payload(keys::INDICES_LATEST) {
        Some(payload) => {
            if indices_freshness == Freshness::Stale {
                degraded_reasons.insert(DegradedReason::Indices);
            }
            let artifact: IndicesArtifact = serde_json::from_value(payload.clone())
                .map_err(|e| PhaseFailure::internal(format!("corrupt indices.latest: {}", e)))?;
            Some(OutlookBlock {
                outlook: artifact.outlook,
                momentum: artifact.momentum,
                benchmark_symbol: artifact.benchmark_symbol,
                indices: artifact.indices,
            })
        }
        None => {
            degraded_reasons.insert(DegradedReason::Indices);
            None
        }
    };

    // News: an empty list stands in for a missing artifact
    let news = match inputs.payload(keys::NEWS_PROCESSED) {
        Some(payload) => {
            if news_freshness == Freshness::Stale {
                degraded_reasons.insert(DegradedReason::News);
            }
            serde_json::from_value::<NewsProcessedArtifact>(payload.clone())
                .map_err(|e| PhaseFailure::internal(format!("corrupt news.processed: {}", e)))?
        }
        None => {
            degraded_reasons.insert(DegradedReason::News);
            NewsProcessedArtifact {
                items: Vec::new(),
                keyword_fallback: false,
            }
        }
    };

    if news.keyword_fallback {
        degraded_reasons.insert(DegradedReason::News);
    }

    // Portfolio: merged only when present; absence is normal, not degraded
    let portfolio = match inputs.payload(keys::PORTFOLIO_IMPACT) {
        Some(payload) => {
            if inputs.freshness(keys::PORTFOLIO_IMPACT) == Freshness::Stale {
                degraded_reasons.insert(DegradedReason::Portfolio);
            }
            Some(
                serde_json::from_value::<PortfolioImpactArtifact>(payload.clone()).map_err(
                    |e| PhaseFailure::internal(format!("corrupt portfolio.impact: {}", e)),
                )?,
            )
        }
        None => None,
    };

    let market_phase = MarketPhase::from_utc(now);
    let summary_bullets = summary_bullets(&news);
    let themed_news = themed_news(&news);

    // Narrative is the only side-effecting step of assembly
    let narrative = match generate_narrative(
        gateway,
        market_phase,
        outlook.as_ref(),
        &summary_bullets,
    )
    .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "narrative inference failed, using template summary");
            degraded_reasons.insert(DegradedReason::Narrative);
            template_narrative(market_phase, outlook.as_ref(), &summary_bullets)
        }
    };

    let snapshot = SnapshotPayload {
        market_phase,
        outlook,
        summary_bullets,
        themed_news,
        portfolio,
        narrative,
        degraded: !degraded_reasons.is_empty(),
        degraded_reasons,
        assembled_at: now,
    };

    Ok(BodyOutput {
        fell_back: snapshot.degraded,
        payload: serde_json::to_value(&snapshot)
            .map_err(|e| PhaseFailure::internal(e.to_string()))?,
    })
}

fn summary_bullets(news: &NewsProcessedArtifact) -> Vec<SummaryBullet> {
    news.items
        .iter()
        .take(market::MAX_SUMMARY_BULLETS)
        .map(|n| {
            let text = if n.causal_note.is_empty() {
                n.item.headline.clone()
            } else {
                format!("{} — {}", n.item.headline, n.causal_note)
            };
            SummaryBullet {
                text,
                sentiment: n.sentiment,
            }
        })
        .collect()
}

fn themed_news(news: &NewsProcessedArtifact) -> Vec<ThemedNewsItem> {
    news.items
        .iter()
        .filter_map(|n| {
            n.theme.as_ref().map(|theme| ThemedNewsItem {
                theme: theme.clone(),
                headline: n.item.headline.clone(),
                summary: n.item.summary.clone(),
                sentiment: n.sentiment,
                is_breaking: n.item.is_breaking,
            })
        })
        .take(market::MAX_THEMED_NEWS_ITEMS)
        .collect()
}

async fn generate_narrative(
    gateway: &dyn UpstreamGateway,
    market_phase: MarketPhase,
    outlook: Option<&OutlookBlock>,
    bullets: &[SummaryBullet],
) -> Result<String, crate::gateway::GatewayError> {
    let context = serde_json::json!({
        "market_phase": market_phase,
        "outlook": outlook,
        "summary_bullets": bullets,
    });

    let request = InferenceRequest {
        system: NARRATIVE_SYSTEM.to_string(),
        prompt: context.to_string(),
        schema: ResponseSchema::Narrative,
    };

    let value = gateway.infer(request).await?;
    // Already schema-validated by the gateway
    let response: NarrativeResponse = serde_json::from_value(value).map_err(|e| {
        crate::gateway::GatewayError::MalformedResponse(format!("narrative decode: {}", e))
    })?;

    Ok(response.narrative)
}

/// Fixed template summary built from raw fields, used when the model is
/// unavailable. Deterministic given the same inputs.
pub fn template_narrative(
    market_phase: MarketPhase,
    outlook: Option<&OutlookBlock>,
    bullets: &[SummaryBullet],
) -> String {
    let phase_text = match market_phase {
        MarketPhase::Pre => "Ahead of the open",
        MarketPhase::Mid => "In today's session",
        MarketPhase::Post => "After the close",
    };

    let direction = match outlook {
        Some(block) => format!(
            "{} ({} {:+.2}%)",
            block.outlook.as_str(),
            block.benchmark_symbol,
            block
                .indices
                .iter()
                .find(|q| q.symbol == block.benchmark_symbol)
                .map(|q| q.change_percent)
                .unwrap_or(0.0)
        ),
        None => "unclear with index data unavailable".to_string(),
    };

    let mut text = format!("{}, the market tone is {}.", phase_text, direction);
    if let Some(first) = bullets.first() {
        text.push_str(&format!(" In focus: {}", first.text));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{IndexQuote, MarketOutlook, Momentum, Sentiment};

    fn outlook_block(change: f64) -> OutlookBlock {
        OutlookBlock {
            outlook: MarketOutlook::from_change_percent(change),
            momentum: Momentum::from_change_percent(change),
            benchmark_symbol: "NIFTY 50".to_string(),
            indices: vec![IndexQuote {
                symbol: "NIFTY 50".to_string(),
                last_price: 24800.0,
                change_percent: change,
                as_of: Utc::now(),
            }],
        }
    }

    #[test]
    fn test_template_narrative_with_outlook() {
        let block = outlook_block(0.9);
        let text = template_narrative(MarketPhase::Post, Some(&block), &[]);

        assert!(text.contains("After the close"));
        assert!(text.contains("bullish"));
        assert!(text.contains("NIFTY 50"));
    }

    #[test]
    fn test_template_narrative_without_outlook() {
        let bullets = vec![SummaryBullet {
            text: "IT stocks slide after weak guidance".to_string(),
            sentiment: Sentiment::Bearish,
        }];
        let text = template_narrative(MarketPhase::Mid, None, &bullets);

        assert!(text.contains("index data unavailable"));
        assert!(text.contains("IT stocks slide"));
    }

    #[test]
    fn test_template_narrative_is_deterministic() {
        let block = outlook_block(-0.7);
        let a = template_narrative(MarketPhase::Pre, Some(&block), &[]);
        let b = template_narrative(MarketPhase::Pre, Some(&block), &[]);
        assert_eq!(a, b);
    }
}
