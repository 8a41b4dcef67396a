pub mod error;
pub mod provider;

pub use error::{LlmError, LlmResult};
pub use provider::{complete_with_retries, CompletionRequest, HttpLlmClient, LlmProvider};

use std::time::Duration;

/// Configuration for the model service client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(base_url: String, api_key: String, model_name: String) -> Self {
        Self {
            base_url,
            api_key,
            model_name,
            timeout: Duration::from_secs(90),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
