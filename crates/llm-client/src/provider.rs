use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};
use crate::LlmConfig;

/// One constrained generation request. `force_json` asks the service to
/// return a single JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub force_json: bool,
}

impl CompletionRequest {
    /// Deterministic JSON-mode request, the shape both the extractor and
    /// analyst start from.
    pub fn json(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.0,
            max_output_tokens: 8192,
            force_json: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// Backend-agnostic interface to the generation service.
///
/// The core depends only on "prompt in, text out, bounded failures" - no
/// vendor interface shape leaks past this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    temperature: f64,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// HTTP-backed provider speaking the model gateway's generate endpoint.
#[derive(Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(LlmError::RequestFailed)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmProvider for HttpLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        let body = GenerateRequest {
            model: &self.config.model_name,
            system: &request.system,
            prompt: &request.prompt,
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
            response_format: request.force_json.then_some("json"),
        };

        let response = self
            .client
            .post(format!("{}/v1/generate", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(LlmError::ServiceUnavailable(format!("status: {}", status)));
        }
        if !status.is_success() {
            return Err(LlmError::InvalidRequest(format!("status: {}", status)));
        }

        let result = response.json::<GenerateResponse>().await?;
        if result.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(result.text)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Call the provider, retrying transient failures up to 2 more times with
/// exponential backoff (1s, 2s). Permanent failures surface immediately.
pub async fn complete_with_retries(
    provider: &dyn LlmProvider,
    request: &CompletionRequest,
) -> LlmResult<String> {
    const MAX_ATTEMPTS: u32 = 3;

    let mut last_error = None;
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1));
            tracing::info!("retrying model call in {:?} (attempt {})", delay, attempt + 1);
            tokio::time::sleep(delay).await;
        }

        match provider.complete(request).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() => {
                tracing::warn!("transient model failure (attempt {}): {}", attempt + 1, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(LlmError::EmptyResponse))
}
