pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use llm_client::{complete_with_retries, CompletionRequest, LlmProvider};
use valuation_core::{InvestmentMemo, StandardizedValuationInput, ValuationError, ValuationResult};

pub use prompts::{build_analysis_prompt, build_memo_repair_prompt, ANALYST_SYSTEM_PROMPT};

const MAX_SCHEMA_RETRIES: usize = 2;

/// Parse and validate a raw memo response.
///
/// Mirrors the extraction boundary: fence stripping, brace slicing, serde
/// validation, then range checks on scores.
pub fn parse_memo(response: &str) -> Result<InvestmentMemo, String> {
    let cleaned = response.trim();
    let cleaned = cleaned.strip_prefix("```json").unwrap_or(cleaned);
    let cleaned = cleaned.strip_prefix("```").unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);

    let start = cleaned
        .find('{')
        .ok_or_else(|| "no JSON object found in response".to_string())?;
    let end = cleaned
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| "no JSON object found in response".to_string())?;

    let memo: InvestmentMemo = serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| format!("schema validation failed: {}", e))?;

    if !(1..=10).contains(&memo.management_integrity_score) {
        return Err(format!(
            "management_integrity_score out of [1,10]: {}",
            memo.management_integrity_score
        ));
    }
    if !(0.0..=1.0).contains(&memo.conviction_level) {
        return Err(format!(
            "conviction_level out of [0,1]: {}",
            memo.conviction_level
        ));
    }
    if memo.key_positives.is_empty() || memo.key_concerns.is_empty() {
        return Err("key_positives and key_concerns must be non-empty".to_string());
    }
    for moat in &memo.competitive_advantages {
        if !(0.0..=1.0).contains(&moat.confidence) {
            return Err(format!("moat confidence out of [0,1]: {}", moat.confidence));
        }
    }

    Ok(memo)
}

/// Analysis stage: qualitative memo over the SVI and computed valuation.
#[derive(Clone)]
pub struct Analyst {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl Analyst {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate a memo. Identity fields and the generating model name are
    /// overwritten from trusted inputs after parsing.
    pub async fn analyze(
        &self,
        input: &StandardizedValuationInput,
        valuation: &ValuationResult,
        narrative: Option<&str>,
    ) -> Result<InvestmentMemo, ValuationError> {
        let attempt = self.analyze_inner(input, valuation, narrative);
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ValuationError::AnalysisFailed(format!(
                "{}: analysis timed out after {:?}",
                valuation.ticker, self.timeout
            ))),
        }
    }

    async fn analyze_inner(
        &self,
        input: &StandardizedValuationInput,
        valuation: &ValuationResult,
        narrative: Option<&str>,
    ) -> Result<InvestmentMemo, ValuationError> {
        let base_prompt = build_analysis_prompt(input, valuation, narrative);
        let mut prompt = base_prompt.clone();
        let mut last_error = String::new();

        for attempt in 0..=MAX_SCHEMA_RETRIES {
            if attempt > 0 {
                tracing::info!(
                    "analysis retry {}/{} for {} after schema error",
                    attempt,
                    MAX_SCHEMA_RETRIES,
                    valuation.ticker
                );
                prompt = build_memo_repair_prompt(&base_prompt, &last_error);
            }

            // A touch of temperature keeps the prose natural; the figures
            // are pinned by the prompt either way.
            let request = CompletionRequest::json(ANALYST_SYSTEM_PROMPT, prompt.as_str())
                .with_temperature(0.7)
                .with_max_output_tokens(16384);
            let response = complete_with_retries(self.provider.as_ref(), &request)
                .await
                .map_err(|e| {
                    ValuationError::AnalysisFailed(format!(
                        "{}: model call failed: {}",
                        valuation.ticker, e
                    ))
                })?;

            match parse_memo(&response) {
                Ok(mut memo) => {
                    memo.ticker = valuation.ticker.clone();
                    memo.company_name = valuation.company_name.clone();
                    memo.analysis_date = Utc::now();
                    memo.model_used = self.provider.model_name().to_string();
                    tracing::info!(
                        "analysis complete for {}: {:?} (conviction {:.2})",
                        memo.ticker,
                        memo.investment_rating,
                        memo.conviction_level,
                    );
                    return Ok(memo);
                }
                Err(e) => {
                    tracing::warn!(
                        "memo parse failed for {} (attempt {}): {}",
                        valuation.ticker,
                        attempt + 1,
                        e
                    );
                    last_error = e;
                }
            }
        }

        Err(ValuationError::AnalysisFailed(format!(
            "{}: model output invalid after {} attempts: {}",
            valuation.ticker,
            MAX_SCHEMA_RETRIES + 1,
            last_error
        )))
    }
}
