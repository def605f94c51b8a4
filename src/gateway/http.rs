//! Live gateway: market data over REST, inference over a JSON-mode endpoint.
//!
//! Both providers are spoken to through the same reqwest client with a
//! per-call timeout; the retry budget wraps each logical call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{IndexQuote, NewsItem};

use super::{
    with_retry, GatewayError, InferenceRequest, RetryPolicy, UpstreamGateway,
};

/// Gateway configuration, supplied by the config loader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the market data/news provider
    pub market_data_url: String,

    /// Inference endpoint (expects JSON-mode structured output)
    pub inference_url: String,

    /// Model identifier passed to the inference endpoint
    pub inference_model: String,

    /// Per-call timeout in seconds
    pub call_timeout_secs: u64,

    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            market_data_url: "http://localhost:8600".to_string(),
            inference_url: "http://localhost:8601/v1/generate".to_string(),
            inference_model: "gemini-2.0-flash".to_string(),
            call_timeout_secs: 20,
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP implementation of [`UpstreamGateway`]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    /// Ask the endpoint for a single JSON object
    response_mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    /// The model output, expected to be a JSON document
    output: String,
}

impl HttpGateway {
    /// Build a gateway. `api_key` is read from `MARKETPULSE_API_KEY` when set.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(config.call_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("http client init: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key: std::env::var("MARKETPULSE_API_KEY").ok(),
        })
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.call_timeout_secs)
    }

    /// Translate transport failures into the gateway taxonomy
    fn classify(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.call_timeout())
        } else if e.is_decode() {
            GatewayError::MalformedResponse(e.to_string())
        } else {
            GatewayError::Unavailable(e.to_string())
        }
    }

    fn check_status(&self, status: reqwest::StatusCode) -> Result<(), GatewayError> {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited);
        }
        if !status.is_success() {
            return Err(GatewayError::Unavailable(format!("status {}", status)));
        }
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        self.check_status(response.status())?;
        response.json::<T>().await.map_err(|e| self.classify(e))
    }

    async fn infer_once(
        &self,
        request: &InferenceRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let body = GenerateRequest {
            model: &self.config.inference_model,
            system: &request.system,
            prompt: &request.prompt,
            response_mime_type: "application/json",
        };

        let mut call = self.client.post(&self.config.inference_url).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| self.classify(e))?;
        self.check_status(response.status())?;

        let generated: GenerateResponse =
            response.json().await.map_err(|e| self.classify(e))?;

        // The model returns text that must itself parse as JSON
        let value: serde_json::Value = serde_json::from_str(&generated.output)
            .map_err(|e| GatewayError::MalformedResponse(format!("inference output: {}", e)))?;

        // Validation failure is malformed regardless of HTTP status
        request.schema.validate(&value)?;
        Ok(value)
    }
}

#[async_trait]
impl UpstreamGateway for HttpGateway {
    async fn fetch_indices(&self, symbols: &[String]) -> Result<Vec<IndexQuote>, GatewayError> {
        let url = format!("{}/indices", self.config.market_data_url);
        let query = [("symbols", symbols.join(","))];

        debug!(symbols = %query[0].1, "fetching index quotes");
        with_retry(&self.config.retry, || self.get_json(&url, &query)).await
    }

    async fn fetch_news(&self, limit: usize) -> Result<Vec<NewsItem>, GatewayError> {
        let url = format!("{}/news", self.config.market_data_url);
        let query = [("limit", limit.to_string())];

        debug!(limit, "fetching news items");
        with_retry(&self.config.retry, || self.get_json(&url, &query)).await
    }

    async fn infer(&self, request: InferenceRequest) -> Result<serde_json::Value, GatewayError> {
        debug!(schema = ?request.schema, "inference call");
        with_retry(&self.config.retry, || self.infer_once(&request)).await
    }
}
