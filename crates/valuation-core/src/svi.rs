use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version mixed into extraction fingerprints. Bump when the SVI
/// shape changes so stale cache entries miss.
pub const SVI_SCHEMA_VERSION: &str = "2";

/// Single fiscal year of annual financials, most recent first in the
/// containing list. Optional fields reflect what the source actually
/// disclosed for that year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalYear {
    pub fiscal_year: i32,
    pub revenue: f64,
    #[serde(default)]
    pub operating_income: Option<f64>,
    pub net_income: f64,
    pub eps: f64,
    #[serde(default)]
    pub free_cash_flow: Option<f64>,
    #[serde(default)]
    pub dividends_paid: Option<f64>,
    #[serde(default)]
    pub shareholders_equity: Option<f64>,
}

/// Normalized valuation inputs for one ticker.
///
/// Produced once by the extraction stage, validated at a single boundary,
/// and immutable afterwards. All monetary values are USD, all ratios are
/// decimals (15% == 0.15), all growth rates are annualized CAGRs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizedValuationInput {
    // Metadata
    pub ticker: String,
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    pub extraction_timestamp: DateTime<Utc>,
    /// Extractor's confidence in the data (completeness x consistency x recency).
    pub data_confidence_score: f64,

    // Market position
    pub current_price: f64,
    pub shares_outstanding: f64,
    pub market_cap: f64,
    pub enterprise_value: f64,

    // Income statement (trailing twelve months)
    pub ttm_revenue: f64,
    pub ttm_operating_income: f64,
    pub ttm_net_income: f64,
    pub ttm_eps: f64,
    pub ttm_ebitda: f64,

    // Cash flow (trailing twelve months)
    pub ttm_free_cash_flow: f64,

    // Balance sheet (latest quarter snapshot)
    pub cash_and_equivalents: f64,
    pub total_cash: f64,
    pub total_debt: f64,
    pub net_debt: f64,
    pub shareholders_equity: f64,

    // Ratios
    pub current_ratio: f64,
    pub gross_margin: f64,
    pub operating_margin: f64,
    pub net_margin: f64,
    pub roe: f64,
    pub roic: f64,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub interest_coverage: Option<f64>,

    // Valuation multiples
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub price_to_book: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,

    // Growth rates
    #[serde(default)]
    pub revenue_growth_1y: Option<f64>,
    #[serde(default)]
    pub revenue_growth_3y_cagr: Option<f64>,
    #[serde(default)]
    pub revenue_growth_5y_cagr: Option<f64>,
    #[serde(default)]
    pub revenue_growth_10y_cagr: Option<f64>,
    #[serde(default)]
    pub earnings_growth_3y_cagr: Option<f64>,
    #[serde(default)]
    pub earnings_growth_5y_cagr: Option<f64>,
    #[serde(default)]
    pub earnings_growth_10y_cagr: Option<f64>,

    // Risk parameters
    #[serde(default)]
    pub beta: Option<f64>,
    pub risk_free_rate: f64,
    #[serde(default = "default_equity_risk_premium")]
    pub equity_risk_premium: f64,

    /// Annual history, most recent first, at most 10 entries.
    pub historical_financials: Vec<HistoricalYear>,

    // Data quality flags
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub estimated_fields: Vec<String>,
    #[serde(default)]
    pub data_anomalies: Vec<String>,
}

fn default_equity_risk_premium() -> f64 {
    0.05
}

impl StandardizedValuationInput {
    /// Beta with the 1.0 default applied when the source had none.
    pub fn beta_or_default(&self) -> f64 {
        self.beta.unwrap_or(1.0)
    }

    /// Years of positive net income found in the annual history.
    pub fn years_positive_earnings(&self) -> usize {
        self.historical_financials
            .iter()
            .filter(|y| y.net_income > 0.0)
            .count()
    }
}
