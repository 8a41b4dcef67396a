pub mod composite;
pub mod dcf;
pub mod graham;
pub mod wacc;

use std::collections::HashMap;

use chrono::Utc;
use valuation_core::{
    DcfValuation, GrahamDefensiveScreen, StandardizedValuationInput, ValuationError,
    ValuationResult,
};

pub use composite::{composite_value, margin_of_safety, upside_pct};
pub use dcf::{calculate_dcf, project_scenario, scenario_params, ScenarioParams};
pub use graham::{calculate_graham_number, calculate_graham_screen};
pub use wacc::{calculate_wacc, credit_spread};

/// Pure, synchronous valuation engine over a validated SVI.
///
/// Every method is a deterministic function of its inputs; no I/O, no
/// suspension points. The orchestrator owns caching around it.
#[derive(Debug, Clone)]
pub struct ValuationEngine {
    tax_rate: f64,
}

impl Default for ValuationEngine {
    fn default() -> Self {
        Self { tax_rate: 0.21 }
    }
}

impl ValuationEngine {
    pub fn new(tax_rate: f64) -> Self {
        Self { tax_rate }
    }

    /// Run WACC -> DCF -> Graham -> composite over one input record.
    pub fn evaluate(
        &self,
        input: &StandardizedValuationInput,
    ) -> Result<ValuationResult, ValuationError> {
        if input.shares_outstanding <= 0.0 {
            return Err(ValuationError::InvalidInputs(format!(
                "{}: shares_outstanding must be positive",
                input.ticker
            )));
        }
        if input.ttm_revenue <= 0.0 {
            return Err(ValuationError::InvalidInputs(format!(
                "{}: ttm_revenue must be positive",
                input.ticker
            )));
        }
        if input.current_price <= 0.0 {
            return Err(ValuationError::InvalidInputs(format!(
                "{}: current_price must be positive",
                input.ticker
            )));
        }

        let mut anomalies = input.data_anomalies.clone();

        let components = wacc::calculate_wacc(input, self.tax_rate);
        let dcf_valuation = dcf::calculate_dcf(input, &components, &mut anomalies)?;
        let graham_number = graham::calculate_graham_number(input);
        let graham_screen = graham::calculate_graham_screen(input);

        let (composite_intrinsic_value, composite_methodology) = composite::composite_value(
            dcf_valuation.weighted_intrinsic_value,
            graham_number.graham_number,
        );
        let upside = composite::upside_pct(composite_intrinsic_value, input.current_price);
        let margin = composite::margin_of_safety(upside);
        let verdict = composite::verdict(upside);

        // Confidence is not attenuated for model disagreement; both scores
        // carry the extraction confidence through unchanged.
        let confidence_score = input.data_confidence_score;
        let key_assumptions = key_assumptions(self.tax_rate, &dcf_valuation);
        let risk_factors = risk_factors(input, &dcf_valuation, &graham_screen, &anomalies);

        tracing::info!(
            "valuation for {}: ${:.2} intrinsic, {:.1}% upside, verdict {:?}",
            input.ticker,
            composite_intrinsic_value,
            upside * 100.0,
            verdict,
        );

        Ok(ValuationResult {
            ticker: input.ticker.clone(),
            company_name: input.company_name.clone(),
            calculation_timestamp: Utc::now(),
            current_price: input.current_price,
            market_cap: input.market_cap,
            enterprise_value: input.enterprise_value,
            shares_outstanding: input.shares_outstanding,
            dcf_valuation,
            graham_number,
            graham_defensive_screen: graham_screen,
            composite_intrinsic_value,
            composite_methodology,
            upside_downside_pct: upside,
            margin_of_safety: margin,
            verdict,
            confidence_score,
            data_quality_score: input.data_confidence_score,
            key_assumptions,
            risk_factors,
            data_anomalies: anomalies,
        })
    }
}

fn key_assumptions(tax_rate: f64, dcf: &DcfValuation) -> HashMap<String, String> {
    let mut assumptions = HashMap::new();
    assumptions.insert(
        "risk_free_rate".to_string(),
        format!("{:.2}%", dcf.risk_free_rate * 100.0),
    );
    assumptions.insert(
        "equity_risk_premium".to_string(),
        format!("{:.2}%", dcf.equity_risk_premium * 100.0),
    );
    assumptions.insert("beta".to_string(), format!("{:.2}", dcf.beta));
    assumptions.insert("wacc".to_string(), format!("{:.2}%", dcf.wacc * 100.0));
    assumptions.insert("tax_rate".to_string(), format!("{:.0}%", tax_rate * 100.0));
    if let Some(base) = &dcf.base_case {
        assumptions.insert(
            "base_case_growth".to_string(),
            format!("{:.1}%", base.revenue_growth_rate * 100.0),
        );
        assumptions.insert(
            "terminal_growth".to_string(),
            format!("{:.1}%", base.terminal_growth_rate * 100.0),
        );
        assumptions.insert(
            "operating_margin".to_string(),
            format!("{:.1}%", base.operating_margin_assumption * 100.0),
        );
        assumptions.insert(
            "projection_years".to_string(),
            base.projection_years.to_string(),
        );
    }
    assumptions.insert("dcf_weight".to_string(), "60%".to_string());
    assumptions.insert("graham_weight".to_string(), "40%".to_string());
    assumptions
}

fn risk_factors(
    input: &StandardizedValuationInput,
    dcf: &DcfValuation,
    screen: &GrahamDefensiveScreen,
    anomalies: &[String],
) -> Vec<String> {
    let mut risks: Vec<String> = anomalies.to_vec();

    if let Some(de) = input.debt_to_equity {
        if de > 2.0 {
            risks.push(format!("High leverage: debt/equity of {:.1}x", de));
        }
    }
    if input.current_ratio > 0.0 && input.current_ratio < 1.0 {
        risks.push(format!(
            "Liquidity concern: current ratio of {:.2}",
            input.current_ratio
        ));
    }
    if let Some(ic) = input.interest_coverage {
        if ic < 3.0 {
            risks.push(format!("Low interest coverage: {:.1}x", ic));
        }
    }
    if let Some(base) = &dcf.base_case {
        if base.revenue_growth_rate > 0.20 {
            risks.push("Valuation assumes aggressive growth (>20% annually)".to_string());
        }
    }
    if dcf.wacc < 0.06 {
        risks.push("Low discount rate may overstate intrinsic value".to_string());
    }
    if !screen.passes_screen {
        risks.push(format!(
            "Fails Graham defensive screen ({}/7 criteria)",
            screen.criteria_passed
        ));
    }
    if !input.missing_fields.is_empty() {
        let shown: Vec<&str> = input
            .missing_fields
            .iter()
            .take(3)
            .map(|s| s.as_str())
            .collect();
        risks.push(format!("Missing data fields: {}", shown.join(", ")));
    }

    risks
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use valuation_core::{HistoricalYear, StandardizedValuationInput};

    /// The all-equity high-quality firm from the acceptance scenarios:
    /// price 100, 10 shares, no debt, 30% margin, eps 10, bvps 40.
    pub fn sample_input() -> StandardizedValuationInput {
        StandardizedValuationInput {
            ticker: "TEST".to_string(),
            company_name: "Test Co".to_string(),
            sector: Some("Technology".to_string()),
            industry: Some("Software".to_string()),
            extraction_timestamp: Utc::now(),
            data_confidence_score: 0.9,
            current_price: 100.0,
            shares_outstanding: 10.0,
            market_cap: 1000.0,
            enterprise_value: 900.0,
            ttm_revenue: 500.0,
            ttm_operating_income: 150.0,
            ttm_net_income: 100.0,
            ttm_eps: 10.0,
            ttm_ebitda: 170.0,
            ttm_free_cash_flow: 90.0,
            cash_and_equivalents: 100.0,
            total_cash: 100.0,
            total_debt: 0.0,
            net_debt: -100.0,
            shareholders_equity: 400.0,
            current_ratio: 3.0,
            gross_margin: 0.60,
            operating_margin: 0.30,
            net_margin: 0.20,
            roe: 0.25,
            roic: 0.20,
            debt_to_equity: Some(0.0),
            interest_coverage: None,
            pe_ratio: Some(10.0),
            price_to_book: Some(2.5),
            dividend_yield: Some(0.02),
            revenue_growth_1y: Some(0.07),
            revenue_growth_3y_cagr: Some(0.075),
            revenue_growth_5y_cagr: Some(0.08),
            revenue_growth_10y_cagr: Some(0.09),
            earnings_growth_3y_cagr: None,
            earnings_growth_5y_cagr: Some(0.10),
            earnings_growth_10y_cagr: Some(0.12),
            beta: None,
            risk_free_rate: 0.04,
            equity_risk_premium: 0.05,
            historical_financials: Vec::new(),
            missing_fields: Vec::new(),
            estimated_fields: Vec::new(),
            data_anomalies: Vec::new(),
        }
    }

    /// Attach `years` of annual history, newest first. EPS rises linearly
    /// from 1.0 at the oldest year when `positive` is set.
    pub fn with_history(
        mut input: StandardizedValuationInput,
        years: usize,
        positive: bool,
    ) -> StandardizedValuationInput {
        input.historical_financials = (0..years)
            .map(|i| {
                let age = years - 1 - i; // 0 = oldest
                let eps = if positive {
                    1.0 + 0.1 * age as f64
                } else {
                    -1.0
                };
                HistoricalYear {
                    fiscal_year: 2025 - i as i32,
                    revenue: 400.0 + 10.0 * age as f64,
                    operating_income: Some(120.0),
                    net_income: if positive { 40.0 } else { -5.0 },
                    eps,
                    free_cash_flow: Some(35.0),
                    dividends_paid: None,
                    shareholders_equity: Some(380.0),
                }
            })
            .collect();
        input
    }
}
