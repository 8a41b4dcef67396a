use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Quarterly and annual statement blocks keyed by period-end date
/// ("2025-09-30"). Values are opaque statement records; field names inside
/// vary by upstream source and are only interpreted by the extraction model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statements {
    #[serde(default)]
    pub income_statement_quarterly: Option<Map<String, Value>>,
    #[serde(default)]
    pub income_statement_annual: Option<Map<String, Value>>,
    #[serde(default)]
    pub balance_sheet_quarterly: Option<Map<String, Value>>,
    #[serde(default)]
    pub cash_flow_quarterly: Option<Map<String, Value>>,
    #[serde(default)]
    pub cash_flow_annual: Option<Map<String, Value>>,
}

/// Raw per-ticker document as collected by the external data layer.
///
/// Sections are carried as opaque JSON: the collector's field names are
/// unreliable ("Revenue" vs "Net Sales") and multiple sections may disagree.
/// The core reads this by reference and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub ticker: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub collected_at: Option<String>,
    #[serde(default)]
    pub company_info: Option<Map<String, Value>>,
    #[serde(default)]
    pub market_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub valuation: Option<Map<String, Value>>,
    #[serde(default)]
    pub calculated_metrics: Option<Map<String, Value>>,
    /// Annual financials keyed by fiscal year ("2025").
    #[serde(default)]
    pub financials_annual: Option<Map<String, Value>>,
    #[serde(default)]
    pub statements: Option<Statements>,
}

impl SourceDocument {
    /// Business description from company metadata, if collected.
    pub fn business_description(&self) -> Option<&str> {
        self.company_info
            .as_ref()
            .and_then(|info| info.get("description"))
            .and_then(|v| v.as_str())
    }
}
