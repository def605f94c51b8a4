//! Upstream gateway: fallible fetch and inference calls behind one trait.
//!
//! The executor only ever talks to [`UpstreamGateway`], so phase logic stays
//! unit-testable with a scripted fake. Retry/backoff and schema validation
//! live here, never in phase logic.

pub mod http;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{IndexQuote, NewsItem, PhaseErrorKind, Sentiment};

// Re-export the live implementation
pub use http::HttpGateway;

/// Classified gateway failures.
///
/// `MalformedResponse` covers both transport-level garbage and inference
/// output that fails schema validation, regardless of upstream HTTP status.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream rate limited")]
    RateLimited,

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Retrying a deterministic parse failure wastes the budget
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GatewayError::MalformedResponse(_))
    }

    /// Map to the phase-level error taxonomy
    pub fn kind(&self) -> PhaseErrorKind {
        match self {
            GatewayError::Timeout(_) => PhaseErrorKind::UpstreamTimeout,
            GatewayError::RateLimited => PhaseErrorKind::UpstreamRateLimited,
            GatewayError::Unavailable(_) => PhaseErrorKind::UpstreamUnavailable,
            GatewayError::MalformedResponse(_) => PhaseErrorKind::MalformedResponse,
        }
    }
}

/// Expected shape of a structured inference response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSchema {
    /// [`NewsAnalysisResponse`]
    NewsAnalysis,
    /// [`NarrativeResponse`]
    Narrative,
}

impl ResponseSchema {
    /// Validate that `value` deserializes into the schema's type.
    /// Called by gateway implementations before a response counts as success.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), GatewayError> {
        let result = match self {
            ResponseSchema::NewsAnalysis => {
                serde_json::from_value::<NewsAnalysisResponse>(value.clone()).map(|_| ())
            }
            ResponseSchema::Narrative => {
                serde_json::from_value::<NarrativeResponse>(value.clone()).map(|_| ())
            }
        };

        result.map_err(|e| GatewayError::MalformedResponse(format!("schema validation: {}", e)))
    }
}

/// Structured annotation of one news item, as returned by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsAssessment {
    pub news_id: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub causal_note: String,
}

/// Schema for news.analyze inference output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsAnalysisResponse {
    pub assessments: Vec<NewsAssessment>,
}

/// Schema for the snapshot narrative inference output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeResponse {
    pub narrative: String,
}

/// One inference call: prompt in, schema-validated JSON out
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub system: String,
    pub prompt: String,
    pub schema: ResponseSchema,
}

/// Boundary to the external market-data/news provider and the AI model.
///
/// Every call carries a bounded timeout and a fixed retry budget inside the
/// implementation; callers see a single typed result.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    async fn fetch_indices(&self, symbols: &[String]) -> Result<Vec<IndexQuote>, GatewayError>;

    async fn fetch_news(&self, limit: usize) -> Result<Vec<NewsItem>, GatewayError>;

    /// The AI call. Implementations must schema-validate the output before
    /// returning it; callers can deserialize without re-checking.
    async fn infer(&self, request: InferenceRequest) -> Result<serde_json::Value, GatewayError>;
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    8000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Run `op` under the retry policy. Non-retryable errors return immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "upstream call failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
