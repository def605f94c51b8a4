//! Shared test harness: a scripted upstream gateway and engine builders.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use marketpulse::config::EngineConfig;
use marketpulse::core::PhaseExecutor;
use marketpulse::domain::{IndexQuote, NewsItem};
use marketpulse::gateway::{GatewayError, InferenceRequest, ResponseSchema, UpstreamGateway};
use marketpulse::store::ArtifactStore;

/// Scripted gateway: tests enqueue per-call results; empty queues fall back
/// to canned successes. No retry logic — one scripted entry is one call.
#[derive(Default)]
pub struct ScriptedGateway {
    indices: Mutex<VecDeque<Result<Vec<IndexQuote>, GatewayError>>>,
    news: Mutex<VecDeque<Result<Vec<NewsItem>, GatewayError>>>,
    infer: Mutex<VecDeque<Result<serde_json::Value, GatewayError>>>,
    pub infer_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    /// Injected latency per call, for concurrency/timeout tests
    pub delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn push_indices(&self, result: Result<Vec<IndexQuote>, GatewayError>) {
        self.indices.lock().unwrap().push_back(result);
    }

    pub fn push_news(&self, result: Result<Vec<NewsItem>, GatewayError>) {
        self.news.lock().unwrap().push_back(result);
    }

    pub fn push_infer(&self, result: Result<serde_json::Value, GatewayError>) {
        self.infer.lock().unwrap().push_back(result);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl UpstreamGateway for ScriptedGateway {
    async fn fetch_indices(&self, _symbols: &[String]) -> Result<Vec<IndexQuote>, GatewayError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        match self.indices.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(vec![quote("NIFTY 50", 0.8), quote("SENSEX", 0.5)]),
        }
    }

    async fn fetch_news(&self, _limit: usize) -> Result<Vec<NewsItem>, GatewayError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        match self.news.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(vec![news_item("n1", "Banks rally on strong credit growth")]),
        }
    }

    async fn infer(&self, request: InferenceRequest) -> Result<serde_json::Value, GatewayError> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        match self.infer.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(match request.schema {
                ResponseSchema::NewsAnalysis => serde_json::json!({
                    "assessments": [{
                        "news_id": "n1",
                        "sentiment": "bullish",
                        "theme": "Banking & Financials",
                        "causal_note": "driven by double-digit credit growth"
                    }]
                }),
                ResponseSchema::Narrative => serde_json::json!({
                    "narrative": "Markets ended higher, led by banking strength."
                }),
            }),
        }
    }
}

pub fn quote(symbol: &str, change_percent: f64) -> IndexQuote {
    IndexQuote {
        symbol: symbol.to_string(),
        last_price: 24800.0,
        change_percent,
        as_of: Utc::now(),
    }
}

pub fn news_item(id: &str, headline: &str) -> NewsItem {
    NewsItem {
        id: id.to_string(),
        headline: headline.to_string(),
        summary: "summary".to_string(),
        source: "wire".to_string(),
        published_at: Utc::now(),
        is_breaking: false,
    }
}

/// Config with scheduled ticks pushed out of the way; tests opt back in.
pub fn test_config(home: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.home = Some(home.to_path_buf());
    config.warm_start = false;

    config.phases.indices_fetch.interval_secs = 3600;
    config.phases.news_fetch.interval_secs = 3600;
    config.phases.news_analyze.interval_secs = 3600;
    config.phases.snapshot_assemble.interval_secs = 3600;

    config
}

pub async fn test_store(temp: &TempDir) -> Arc<ArtifactStore> {
    Arc::new(ArtifactStore::open(temp.path()).await.unwrap())
}

pub async fn test_executor(
    temp: &TempDir,
    gateway: Arc<ScriptedGateway>,
    config: EngineConfig,
) -> (Arc<ArtifactStore>, Arc<PhaseExecutor>) {
    let store = test_store(temp).await;
    let executor = Arc::new(PhaseExecutor::new(
        store.clone(),
        gateway,
        Arc::new(config),
    ));
    (store, executor)
}
