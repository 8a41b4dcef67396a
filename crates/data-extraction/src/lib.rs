pub mod parse;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use llm_client::{complete_with_retries, CompletionRequest, LlmError, LlmProvider};
use stock_data::TruncatedSource;
use valuation_core::{StandardizedValuationInput, ValuationError};

pub use parse::{parse_svi, SchemaError};
pub use prompts::{build_extraction_prompt, build_repair_prompt, SYSTEM_PROMPT};

/// Tolerance for identities the model must satisfy (net debt, market cap,
/// enterprise value). Larger relative deviations are recomputed and logged.
const IDENTITY_TOLERANCE: f64 = 0.01;

const MAX_SCHEMA_RETRIES: usize = 2;

/// Extraction stage: turns a truncated source into a validated SVI via the
/// constrained model, with schema-feedback retries and core-side fixups.
#[derive(Clone)]
pub struct Extractor {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    equity_risk_premium_default: f64,
}

impl Extractor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            timeout: Duration::from_secs(60),
            equity_risk_premium_default: 0.05,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_equity_risk_premium_default(mut self, erp: f64) -> Self {
        self.equity_risk_premium_default = erp;
        self
    }

    /// Extract the SVI for one ticker. The wall clock budget covers all
    /// retries; exceeding it surfaces as `ExtractionFailed`.
    pub async fn extract(
        &self,
        ticker: &str,
        truncated: &TruncatedSource,
    ) -> Result<StandardizedValuationInput, ValuationError> {
        let attempt = self.extract_inner(ticker, truncated);
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ValuationError::ExtractionFailed(format!(
                "{}: extraction timed out after {:?}",
                ticker, self.timeout
            ))),
        }
    }

    async fn extract_inner(
        &self,
        ticker: &str,
        truncated: &TruncatedSource,
    ) -> Result<StandardizedValuationInput, ValuationError> {
        let base_prompt = build_extraction_prompt(truncated);
        let mut prompt = base_prompt.clone();
        let mut last_error = String::new();

        for attempt in 0..=MAX_SCHEMA_RETRIES {
            if attempt > 0 {
                tracing::info!(
                    "extraction retry {}/{} for {} after schema error",
                    attempt,
                    MAX_SCHEMA_RETRIES,
                    ticker
                );
                prompt = build_repair_prompt(&base_prompt, &last_error);
            }

            let request = CompletionRequest::json(SYSTEM_PROMPT, prompt.as_str());
            let response = complete_with_retries(self.provider.as_ref(), &request)
                .await
                .map_err(|e| map_llm_error(ticker, e))?;

            match parse_svi(&response) {
                Ok(mut svi) => {
                    apply_fixups(&mut svi, self.equity_risk_premium_default);
                    tracing::info!(
                        "extraction complete for {} (confidence {:.2}, missing {}, estimated {})",
                        ticker,
                        svi.data_confidence_score,
                        svi.missing_fields.len(),
                        svi.estimated_fields.len(),
                    );
                    return Ok(svi);
                }
                Err(e) => {
                    tracing::warn!(
                        "extraction parse failed for {} (attempt {}): {}",
                        ticker,
                        attempt + 1,
                        e
                    );
                    last_error = e.0;
                }
            }
        }

        Err(ValuationError::ExtractionFailed(format!(
            "{}: model output invalid after {} attempts: {}",
            ticker,
            MAX_SCHEMA_RETRIES + 1,
            last_error
        )))
    }
}

fn map_llm_error(ticker: &str, error: LlmError) -> ValuationError {
    ValuationError::ExtractionFailed(format!("{}: model call failed: {}", ticker, error))
}

fn relative_gap(reported: f64, recomputed: f64) -> f64 {
    let scale = recomputed.abs().max(1.0);
    (reported - recomputed).abs() / scale
}

/// Post-validation fixups performed by the core, not the model:
/// identity recomputation with anomaly logging, beta clamping, ERP default.
pub fn apply_fixups(svi: &mut StandardizedValuationInput, erp_default: f64) {
    // net_debt = total_debt - total_cash, always recomputed.
    let net_debt = svi.total_debt - svi.total_cash;
    if relative_gap(svi.net_debt, net_debt) > IDENTITY_TOLERANCE {
        svi.data_anomalies.push(format!(
            "net_debt reported {:.0} but recomputed {:.0}; using recomputed",
            svi.net_debt, net_debt
        ));
    }
    svi.net_debt = net_debt;

    // market_cap = price * shares within 1%.
    let market_cap = svi.current_price * svi.shares_outstanding;
    if relative_gap(svi.market_cap, market_cap) > IDENTITY_TOLERANCE {
        svi.data_anomalies.push(format!(
            "market_cap reported {:.0} but recomputed {:.0}; using recomputed",
            svi.market_cap, market_cap
        ));
        svi.market_cap = market_cap;
    }

    // enterprise_value = market_cap + debt - cash.
    let enterprise_value = svi.market_cap + svi.total_debt - svi.total_cash;
    if relative_gap(svi.enterprise_value, enterprise_value) > IDENTITY_TOLERANCE {
        svi.data_anomalies.push(format!(
            "enterprise_value reported {:.0} but recomputed {:.0}; using recomputed",
            svi.enterprise_value, enterprise_value
        ));
    }
    svi.enterprise_value = enterprise_value;

    // Betas outside [0.1, 3.0] are junk; replace with the market beta.
    if let Some(beta) = svi.beta {
        if !(0.1..=3.0).contains(&beta) {
            svi.beta = Some(1.0);
            svi.estimated_fields.push(format!(
                "beta (reported {:.2}, replaced with 1.0)",
                beta
            ));
        }
    }

    let erp_missing = svi
        .missing_fields
        .iter()
        .any(|f| f == "equity_risk_premium");
    if svi.equity_risk_premium <= 0.0 || erp_missing {
        svi.equity_risk_premium = erp_default;
    }
}
