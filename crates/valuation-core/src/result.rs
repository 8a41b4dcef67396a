use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine version mixed into valuation fingerprints.
pub const ENGINE_VERSION: &str = "1";

/// Investment verdict derived from upside to the composite intrinsic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationVerdict {
    SignificantlyUndervalued,
    Undervalued,
    FairlyValued,
    Overvalued,
    SignificantlyOvervalued,
}

impl ValuationVerdict {
    /// Band mapping, evaluated top-down with strict comparisons:
    /// > 40% upside, > 15%, > -15%, > -40%, else significantly overvalued.
    pub fn from_upside(upside_pct: f64) -> Self {
        if upside_pct > 0.40 {
            ValuationVerdict::SignificantlyUndervalued
        } else if upside_pct > 0.15 {
            ValuationVerdict::Undervalued
        } else if upside_pct > -0.15 {
            ValuationVerdict::FairlyValued
        } else if upside_pct > -0.40 {
            ValuationVerdict::Overvalued
        } else {
            ValuationVerdict::SignificantlyOvervalued
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            ValuationVerdict::SignificantlyUndervalued => "Significantly Undervalued",
            ValuationVerdict::Undervalued => "Undervalued",
            ValuationVerdict::FairlyValued => "Fairly Valued",
            ValuationVerdict::Overvalued => "Overvalued",
            ValuationVerdict::SignificantlyOvervalued => "Significantly Overvalued",
        }
    }
}

/// Cost-of-capital components backing the DCF discount rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccComponents {
    pub risk_free_rate: f64,
    pub beta: f64,
    pub equity_risk_premium: f64,
    pub cost_of_equity: f64,
    pub credit_spread: f64,
    pub cost_of_debt_pretax: f64,
    pub tax_rate: f64,
    pub cost_of_debt_aftertax: f64,
    pub equity_weight: f64,
    pub debt_weight: f64,
    pub wacc: f64,
}

/// One DCF scenario: five projected years plus Gordon terminal value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfScenario {
    pub scenario_name: String,
    pub revenue_growth_rate: f64,
    pub operating_margin_assumption: f64,
    /// Reflects the safety clamp when WACC <= the configured terminal rate.
    pub terminal_growth_rate: f64,
    pub wacc: f64,
    pub projection_years: usize,
    pub projected_revenue: Vec<f64>,
    pub projected_ebit: Vec<f64>,
    pub projected_nopat: Vec<f64>,
    pub projected_fcf: Vec<f64>,
    pub terminal_fcf: f64,
    pub terminal_value: f64,
    pub pv_explicit_period: f64,
    pub pv_terminal_value: f64,
    pub enterprise_value: f64,
    pub equity_value: f64,
    pub intrinsic_value_per_share: f64,
    pub current_price: f64,
    pub upside_downside_pct: f64,
}

/// Complete DCF block: WACC components, three scenarios (a failed scenario
/// is a None slot), the probability-weighted value, and WACC sensitivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfValuation {
    pub calculation_timestamp: DateTime<Utc>,
    pub methodology: String,
    pub risk_free_rate: f64,
    pub beta: f64,
    pub equity_risk_premium: f64,
    pub cost_of_equity: f64,
    pub cost_of_debt_pretax: f64,
    pub tax_rate: f64,
    pub cost_of_debt_aftertax: f64,
    pub debt_weight: f64,
    pub equity_weight: f64,
    pub wacc: f64,
    pub conservative: Option<DcfScenario>,
    pub base_case: Option<DcfScenario>,
    pub optimistic: Option<DcfScenario>,
    /// Weights actually applied; renormalized when a scenario is unavailable.
    pub scenario_weights: HashMap<String, f64>,
    pub weighted_intrinsic_value: f64,
    pub sensitivity_to_wacc: HashMap<String, f64>,
    /// Reserved; always empty in this version.
    pub sensitivity_to_growth: HashMap<String, f64>,
}

/// Graham Number block: sqrt(22.5 * EPS * BVPS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrahamNumber {
    pub eps_ttm: f64,
    pub book_value_per_share: f64,
    pub graham_multiplier: f64,
    pub graham_number: f64,
    pub current_price: f64,
    /// -1.0 when the formula does not apply (non-positive EPS or BVPS).
    pub upside_pct: f64,
}

/// Graham's seven defensive-investor criteria with per-criterion actuals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrahamDefensiveScreen {
    pub adequate_size: bool,
    pub actual_revenue: f64,

    pub strong_financial_condition: bool,
    pub actual_current_ratio: f64,

    pub earnings_stability: bool,
    pub years_positive_earnings: usize,

    pub dividend_record: bool,
    pub years_dividends_paid: u32,
    /// True when the 20-year record was defaulted from a positive yield
    /// rather than observed history.
    pub dividend_years_estimated: bool,

    pub earnings_growth: bool,
    pub eps_10y_growth: Option<f64>,

    pub moderate_pe: bool,
    pub actual_pe: Option<f64>,

    pub moderate_pb: bool,
    pub actual_pb: Option<f64>,

    pub graham_product: Option<f64>,
    pub graham_product_passes: bool,

    pub criteria_passed: u32,
    pub total_criteria: u32,
    pub passes_screen: bool,
}

/// Full valuation output: DCF + Graham + composite verdict. Immutable once
/// produced; the cache is its persistent owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationResult {
    pub ticker: String,
    pub company_name: String,
    pub calculation_timestamp: DateTime<Utc>,

    pub current_price: f64,
    pub market_cap: f64,
    pub enterprise_value: f64,
    pub shares_outstanding: f64,

    pub dcf_valuation: DcfValuation,
    pub graham_number: GrahamNumber,
    pub graham_defensive_screen: GrahamDefensiveScreen,

    pub composite_intrinsic_value: f64,
    pub composite_methodology: String,
    pub upside_downside_pct: f64,
    pub margin_of_safety: f64,
    pub verdict: ValuationVerdict,

    pub confidence_score: f64,
    pub data_quality_score: f64,

    pub key_assumptions: HashMap<String, String>,
    pub risk_factors: Vec<String>,
    pub data_anomalies: Vec<String>,
}
