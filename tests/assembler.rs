//! SnapshotAssembler integration tests: the degradation table.

mod common;

use chrono::Duration;
use serde_json::json;
use tempfile::TempDir;

use common::ScriptedGateway;
use marketpulse::core::assembler::template_narrative;
use marketpulse::core::TriggerResult;
use marketpulse::domain::{
    keys, DegradedReason, PhaseErrorKind, PhaseName, PhaseOutcome, PortfolioSentiment,
    SnapshotPayload,
};
use marketpulse::gateway::GatewayError;
use marketpulse::store::ArtifactStore;

fn finished(result: TriggerResult) -> marketpulse::domain::PhaseRun {
    match result {
        TriggerResult::Finished(run) => run,
        TriggerResult::AlreadyRunning => panic!("expected a finished run"),
    }
}

fn indices_payload(change_percent: f64) -> serde_json::Value {
    json!({
        "indices": [{
            "symbol": "NIFTY 50",
            "last_price": 24800.0,
            "change_percent": change_percent,
            "as_of": chrono::Utc::now(),
        }],
        "benchmark_symbol": "NIFTY 50",
        "outlook": if change_percent > 0.5 { "bullish" } else { "neutral" },
        "momentum": "moderate_up",
    })
}

fn news_payload() -> serde_json::Value {
    json!({
        "items": [{
            "id": "n1",
            "headline": "Banks rally on strong credit growth",
            "summary": "summary",
            "source": "wire",
            "published_at": chrono::Utc::now(),
            "is_breaking": false,
            "sentiment": "bullish",
            "theme": "Banking & Financials",
            "causal_note": "driven by double-digit credit growth",
        }],
        "keyword_fallback": false,
    })
}

async fn put_fresh(store: &ArtifactStore, key: &str, payload: serde_json::Value) {
    store.put(key, payload, Duration::minutes(10)).await.unwrap();
}

async fn read_snapshot(store: &ArtifactStore) -> SnapshotPayload {
    let artifact = store.get(keys::SNAPSHOT_COMPOSITE).await.unwrap().unwrap();
    serde_json::from_value(artifact.payload).unwrap()
}

#[tokio::test]
async fn test_all_fresh_inputs_assemble_clean() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    put_fresh(&store, keys::INDICES_LATEST, indices_payload(0.8)).await;
    put_fresh(&store, keys::NEWS_PROCESSED, news_payload()).await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);
    assert_eq!(run.outcome, PhaseOutcome::Success);

    let snapshot = read_snapshot(&store).await;
    assert!(!snapshot.degraded);
    assert!(snapshot.degraded_reasons.is_empty());
    assert!(snapshot.outlook.is_some());
    // No portfolio artifact was written: the block is absent, not degraded
    assert!(snapshot.portfolio.is_none());
    assert_eq!(snapshot.summary_bullets.len(), 1);
    assert_eq!(snapshot.themed_news[0].theme, "Banking & Financials");
    assert_eq!(
        snapshot.narrative,
        "Markets ended higher, led by banking strength."
    );
}

#[tokio::test]
async fn test_missing_indices_omits_outlook_and_degrades() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    put_fresh(&store, keys::NEWS_PROCESSED, news_payload()).await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);
    assert_eq!(run.outcome, PhaseOutcome::Degraded);

    let snapshot = read_snapshot(&store).await;
    assert!(snapshot.degraded);
    assert_eq!(
        snapshot.degraded_reasons.iter().copied().collect::<Vec<_>>(),
        vec![DegradedReason::Indices]
    );
    assert!(snapshot.outlook.is_none());
    // Summary content from news still present
    assert!(!snapshot.summary_bullets.is_empty());
    assert!(!snapshot.narrative.is_empty());
}

#[tokio::test]
async fn test_stale_indices_used_anyway_and_flagged() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    store
        .put(keys::INDICES_LATEST, indices_payload(0.8), Duration::zero())
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    put_fresh(&store, keys::NEWS_PROCESSED, news_payload()).await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);
    assert_eq!(run.outcome, PhaseOutcome::Degraded);

    let snapshot = read_snapshot(&store).await;
    // Stale data beats no data: the block is present but flagged
    assert!(snapshot.outlook.is_some());
    assert!(snapshot.degraded_reasons.contains(&DegradedReason::Indices));
}

#[tokio::test]
async fn test_missing_news_uses_empty_list() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    put_fresh(&store, keys::INDICES_LATEST, indices_payload(0.8)).await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);
    assert_eq!(run.outcome, PhaseOutcome::Degraded);

    let snapshot = read_snapshot(&store).await;
    assert!(snapshot.degraded);
    assert!(snapshot.degraded_reasons.contains(&DegradedReason::News));
    assert!(snapshot.summary_bullets.is_empty());
    assert!(snapshot.themed_news.is_empty());
    assert!(snapshot.outlook.is_some());
}

#[tokio::test]
async fn test_narrative_failure_falls_back_to_template() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    gateway.push_infer(Err(GatewayError::Timeout(std::time::Duration::from_secs(20))));
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    put_fresh(&store, keys::INDICES_LATEST, indices_payload(0.8)).await;
    put_fresh(&store, keys::NEWS_PROCESSED, news_payload()).await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);
    assert_eq!(run.outcome, PhaseOutcome::Degraded);

    let snapshot = read_snapshot(&store).await;
    assert!(snapshot.degraded);
    assert!(snapshot.degraded_reasons.contains(&DegradedReason::Narrative));

    // The narrative is exactly the fixed template built from raw fields
    let expected = template_narrative(
        snapshot.market_phase,
        snapshot.outlook.as_ref(),
        &snapshot.summary_bullets,
    );
    assert_eq!(snapshot.narrative, expected);
}

#[tokio::test]
async fn test_no_inputs_at_all_fails_without_write() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);

    assert_eq!(run.outcome, PhaseOutcome::Failed);
    assert_eq!(run.error_kind, Some(PhaseErrorKind::MissingRequiredInput));
    assert!(store.get(keys::SNAPSHOT_COMPOSITE).await.unwrap().is_none());
}

#[tokio::test]
async fn test_degraded_news_input_propagates_to_snapshot() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    put_fresh(&store, keys::INDICES_LATEST, indices_payload(0.8)).await;
    let mut news = news_payload();
    news["keyword_fallback"] = json!(true);
    put_fresh(&store, keys::NEWS_PROCESSED, news).await;

    finished(executor.run(PhaseName::SnapshotAssemble).await);

    let snapshot = read_snapshot(&store).await;
    assert!(snapshot.degraded);
    assert!(snapshot.degraded_reasons.contains(&DegradedReason::News));
}

#[tokio::test]
async fn test_portfolio_artifact_is_merged_when_present() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    put_fresh(&store, keys::INDICES_LATEST, indices_payload(0.8)).await;
    put_fresh(&store, keys::NEWS_PROCESSED, news_payload()).await;
    put_fresh(
        &store,
        keys::PORTFOLIO_IMPACT,
        json!({
            "watchlist_impacted": ["HDFCBANK"],
            "watchlist_alerts": [{
                "symbol": "HDFCBANK",
                "alert_type": "opportunity",
                "note": "credit growth supports NII expansion",
            }],
            "impact_summary": "Banking-heavy portfolio benefits from the rally.",
            "portfolio_sentiment": "positive",
        }),
    )
    .await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);
    assert_eq!(run.outcome, PhaseOutcome::Success);

    let snapshot = read_snapshot(&store).await;
    assert!(!snapshot.degraded);
    let portfolio = snapshot.portfolio.unwrap();
    assert_eq!(portfolio.watchlist_impacted, vec!["HDFCBANK"]);
    assert_eq!(portfolio.watchlist_alerts.len(), 1);
    assert_eq!(
        portfolio.portfolio_sentiment,
        Some(PortfolioSentiment::Positive)
    );
}

#[tokio::test]
async fn test_stale_portfolio_used_anyway_and_flagged() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    put_fresh(&store, keys::INDICES_LATEST, indices_payload(0.8)).await;
    put_fresh(&store, keys::NEWS_PROCESSED, news_payload()).await;
    store
        .put(
            keys::PORTFOLIO_IMPACT,
            json!({"watchlist_impacted": ["TCS"]}),
            Duration::zero(),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let run = finished(executor.run(PhaseName::SnapshotAssemble).await);
    assert_eq!(run.outcome, PhaseOutcome::Degraded);

    let snapshot = read_snapshot(&store).await;
    assert!(snapshot.portfolio.is_some());
    assert!(snapshot.degraded_reasons.contains(&DegradedReason::Portfolio));
}
