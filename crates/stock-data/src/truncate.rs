use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use valuation_core::ValuationError;

use crate::document::SourceDocument;

const MAX_ANNUAL_YEARS: usize = 10;
const MAX_QUARTERS: usize = 4;
const MAX_METRIC_HISTORY_YEARS: usize = 5;

/// Whitelisted subset of a SourceDocument handed to the extraction model.
///
/// Sections are copied verbatim; everything outside the whitelist is
/// dropped. Target size is <= 25 KB for a typical document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncatedSource {
    pub ticker: String,
    pub company_name: String,
    pub collected_at: String,
    pub company_info: Map<String, Value>,
    pub market_data: Map<String, Value>,
    #[serde(default)]
    pub valuation: Option<Map<String, Value>>,
    #[serde(default)]
    pub calculated_metrics: Option<Map<String, Value>>,
    pub financials_annual: Map<String, Value>,
    #[serde(default)]
    pub income_statement_quarterly: Option<Map<String, Value>>,
    #[serde(default)]
    pub balance_sheet_latest: Option<Map<String, Value>>,
    #[serde(default)]
    pub cash_flow_quarterly: Option<Map<String, Value>>,
    /// Degradations observed while truncating (missing quarterlies). The
    /// extractor reflects these in the confidence score.
    #[serde(default)]
    pub quality_notes: Vec<String>,
}

impl TruncatedSource {
    /// Canonical JSON for fingerprinting: serde_json keeps object keys in
    /// BTreeMap order (lexicographic) and emits no insignificant whitespace.
    pub fn canonical_json(&self) -> Result<String, ValuationError> {
        let value = serde_json::to_value(self)
            .map_err(|e| ValuationError::CacheError(format!("canonicalize failed: {}", e)))?;
        serde_json::to_string(&value)
            .map_err(|e| ValuationError::CacheError(format!("canonicalize failed: {}", e)))
    }
}

/// Keep the `limit` entries with the largest keys (period-end dates and
/// fiscal years sort lexicographically in chronological order).
fn most_recent(map: &Map<String, Value>, limit: usize) -> Map<String, Value> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| b.cmp(a));
    keys.into_iter()
        .take(limit)
        .map(|k| (k.clone(), map[k].clone()))
        .collect()
}

/// Reduce a raw document to the extraction whitelist.
///
/// Fails with `InsufficientSourceData` when company metadata, market data,
/// or annual financials are entirely absent. Missing quarterly statements
/// degrade quality but are not fatal.
pub fn truncate(doc: &SourceDocument) -> Result<TruncatedSource, ValuationError> {
    let company_info = doc
        .company_info
        .as_ref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            ValuationError::InsufficientSourceData(format!(
                "{}: company metadata absent",
                doc.ticker
            ))
        })?;
    let market_data = doc
        .market_data
        .as_ref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            ValuationError::InsufficientSourceData(format!("{}: market data absent", doc.ticker))
        })?;
    let financials_annual = doc
        .financials_annual
        .as_ref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            ValuationError::InsufficientSourceData(format!(
                "{}: annual financials absent",
                doc.ticker
            ))
        })?;

    // Officer lists are large and irrelevant to extraction.
    let mut company_info = company_info.clone();
    company_info.remove("officers");

    // Calculated metrics keep only recent nested history.
    let calculated_metrics = doc.calculated_metrics.as_ref().map(|metrics| {
        let mut trimmed = metrics.clone();
        if let Some(Value::Object(hist)) = trimmed.get("historical") {
            let recent = most_recent(hist, MAX_METRIC_HISTORY_YEARS);
            trimmed.insert("historical".to_string(), Value::Object(recent));
        }
        trimmed
    });

    let mut quality_notes = Vec::new();
    let statements = doc.statements.as_ref();

    let income_statement_quarterly = statements
        .and_then(|s| s.income_statement_quarterly.as_ref())
        .filter(|m| !m.is_empty())
        .map(|m| most_recent(m, MAX_QUARTERS));
    if income_statement_quarterly.is_none() {
        quality_notes.push("quarterly income statements missing".to_string());
    }

    let balance_sheet_latest = statements
        .and_then(|s| s.balance_sheet_quarterly.as_ref())
        .filter(|m| !m.is_empty())
        .and_then(|m| {
            most_recent(m, 1)
                .values()
                .next()
                .and_then(|v| v.as_object().cloned())
        });
    if balance_sheet_latest.is_none() {
        quality_notes.push("quarterly balance sheet missing".to_string());
    }

    let cash_flow_quarterly = statements
        .and_then(|s| s.cash_flow_quarterly.as_ref())
        .filter(|m| !m.is_empty())
        .map(|m| most_recent(m, MAX_QUARTERS));
    if cash_flow_quarterly.is_none() {
        quality_notes.push("quarterly cash flow statements missing".to_string());
    }

    let truncated = TruncatedSource {
        ticker: doc.ticker.clone(),
        company_name: doc.company_name.clone().unwrap_or_else(|| doc.ticker.clone()),
        collected_at: doc.collected_at.clone().unwrap_or_default(),
        company_info,
        market_data: market_data.clone(),
        valuation: doc.valuation.clone(),
        calculated_metrics,
        financials_annual: most_recent(financials_annual, MAX_ANNUAL_YEARS),
        income_statement_quarterly,
        balance_sheet_latest,
        cash_flow_quarterly,
        quality_notes,
    };

    tracing::debug!(
        "truncated {}: {} annual years, quarterlies present: income={} balance={} cashflow={}",
        truncated.ticker,
        truncated.financials_annual.len(),
        truncated.income_statement_quarterly.is_some(),
        truncated.balance_sheet_latest.is_some(),
        truncated.cash_flow_quarterly.is_some(),
    );

    Ok(truncated)
}
