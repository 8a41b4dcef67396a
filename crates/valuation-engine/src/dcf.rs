use std::collections::HashMap;

use chrono::Utc;
use valuation_core::{
    DcfScenario, DcfValuation, StandardizedValuationInput, ValuationError, WaccComponents,
};

const PROJECTION_YEARS: usize = 5;
const ROIC_FLOOR: f64 = 0.10;
const REINVESTMENT_CAP: f64 = 0.80;

/// Assumptions for one scenario before projection.
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub name: &'static str,
    pub growth: f64,
    pub terminal_growth: f64,
    pub operating_margin: f64,
}

/// Derive the three scenario parameter sets from historical growth and the
/// current operating margin.
pub fn scenario_params(input: &StandardizedValuationInput) -> [ScenarioParams; 3] {
    let mut base_growth = input.revenue_growth_5y_cagr.unwrap_or(0.05);
    if base_growth < 0.0 {
        // A shrinking top line still gets a minimal nominal-growth assumption.
        base_growth = 0.03;
    }
    let margin = input.operating_margin;

    [
        ScenarioParams {
            name: "conservative",
            growth: (base_growth * 0.5).max(0.02),
            terminal_growth: 0.020,
            operating_margin: margin * 0.85,
        },
        ScenarioParams {
            name: "base_case",
            growth: base_growth,
            terminal_growth: 0.025,
            operating_margin: margin,
        },
        ScenarioParams {
            name: "optimistic",
            growth: (base_growth * 1.5).min(0.25),
            terminal_growth: 0.030,
            operating_margin: (margin * 1.15).min(0.35),
        },
    ]
}

fn check_finite(value: f64, scenario: &str, what: &str) -> Result<f64, ValuationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValuationError::NumericOverflow(format!(
            "{}: non-finite {}",
            scenario, what
        )))
    }
}

/// Project one scenario: five years of FCFF, Gordon terminal value,
/// discount to present, bridge to per-share equity value.
pub fn project_scenario(
    input: &StandardizedValuationInput,
    params: &ScenarioParams,
    wacc: f64,
    tax_rate: f64,
) -> Result<DcfScenario, ValuationError> {
    let roic = if input.roic > 0.0 {
        input.roic.max(ROIC_FLOOR)
    } else {
        ROIC_FLOOR
    };

    let mut projected_revenue = Vec::with_capacity(PROJECTION_YEARS);
    let mut projected_ebit = Vec::with_capacity(PROJECTION_YEARS);
    let mut projected_nopat = Vec::with_capacity(PROJECTION_YEARS);
    let mut projected_fcf = Vec::with_capacity(PROJECTION_YEARS);

    let mut revenue = input.ttm_revenue;
    for year in 1..=PROJECTION_YEARS {
        // Growth decays toward the terminal rate, halving the gap by year 5.
        let year_growth = params.growth
            - (params.growth - params.terminal_growth) * (year as f64 / (2.0 * PROJECTION_YEARS as f64));

        revenue = check_finite(revenue * (1.0 + year_growth), params.name, "revenue")?;
        if revenue <= 0.0 {
            return Err(ValuationError::NumericOverflow(format!(
                "{}: non-positive projected revenue in year {}",
                params.name, year
            )));
        }

        let ebit = check_finite(revenue * params.operating_margin, params.name, "ebit")?;
        let nopat = check_finite(ebit * (1.0 - tax_rate), params.name, "nopat")?;

        let reinvestment = (year_growth / roic).clamp(0.0, REINVESTMENT_CAP);
        let fcf = check_finite(nopat * (1.0 - reinvestment), params.name, "fcf")?;

        projected_revenue.push(revenue);
        projected_ebit.push(ebit);
        projected_nopat.push(nopat);
        projected_fcf.push(fcf);
    }

    // Gordon terminal value; the safety clamp keeps WACC strictly above the
    // terminal rate.
    let mut terminal_growth = params.terminal_growth;
    if wacc <= terminal_growth {
        terminal_growth = wacc - 0.01;
        tracing::warn!(
            "{}: terminal growth {:.2}% >= WACC {:.2}%, clamped to {:.2}%",
            params.name,
            params.terminal_growth * 100.0,
            wacc * 100.0,
            terminal_growth * 100.0,
        );
    }

    let last_fcf = *projected_fcf.last().expect("projection is non-empty");
    let terminal_fcf = check_finite(last_fcf * (1.0 + terminal_growth), params.name, "terminal fcf")?;
    let terminal_value =
        check_finite(terminal_fcf / (wacc - terminal_growth), params.name, "terminal value")?;

    let pv_explicit: f64 = projected_fcf
        .iter()
        .enumerate()
        .map(|(i, fcf)| fcf / (1.0 + wacc).powi(i as i32 + 1))
        .sum();
    let pv_explicit = check_finite(pv_explicit, params.name, "pv explicit")?;
    let pv_terminal = check_finite(
        terminal_value / (1.0 + wacc).powi(PROJECTION_YEARS as i32),
        params.name,
        "pv terminal",
    )?;

    let enterprise_value = pv_explicit + pv_terminal;
    let equity_value = enterprise_value - input.net_debt;
    let intrinsic_value_per_share =
        check_finite(equity_value / input.shares_outstanding, params.name, "per-share value")?
            .max(0.0);

    let upside_downside_pct = if input.current_price > 0.0 {
        (intrinsic_value_per_share - input.current_price) / input.current_price
    } else {
        0.0
    };

    Ok(DcfScenario {
        scenario_name: params.name.to_string(),
        revenue_growth_rate: params.growth,
        operating_margin_assumption: params.operating_margin,
        terminal_growth_rate: terminal_growth,
        wacc,
        projection_years: PROJECTION_YEARS,
        projected_revenue,
        projected_ebit,
        projected_nopat,
        projected_fcf,
        terminal_fcf,
        terminal_value,
        pv_explicit_period: pv_explicit,
        pv_terminal_value: pv_terminal,
        enterprise_value,
        equity_value,
        intrinsic_value_per_share,
        current_price: input.current_price,
        upside_downside_pct,
    })
}

/// Full DCF block: three scenarios, probability weighting (renormalized when
/// a scenario aborts), and WACC +/- 1% sensitivity on the base case.
///
/// A scenario-level numeric failure leaves a `None` slot and an anomaly
/// entry; only all three failing is fatal.
pub fn calculate_dcf(
    input: &StandardizedValuationInput,
    components: &WaccComponents,
    anomalies: &mut Vec<String>,
) -> Result<DcfValuation, ValuationError> {
    if input.roic <= 0.0 {
        anomalies.push("roic<=0, used 10% floor".to_string());
    }

    let params = scenario_params(input);
    let wacc = components.wacc;
    let tax_rate = components.tax_rate;

    let mut scenarios: Vec<Option<DcfScenario>> = Vec::with_capacity(3);
    for p in &params {
        match project_scenario(input, p, wacc, tax_rate) {
            Ok(s) => scenarios.push(Some(s)),
            Err(e) => {
                tracing::warn!("scenario {} unavailable for {}: {}", p.name, input.ticker, e);
                anomalies.push(format!("scenario {} unavailable: {}", p.name, e));
                scenarios.push(None);
            }
        }
    }

    let base_weights = [0.25, 0.50, 0.25];
    let available_weight: f64 = scenarios
        .iter()
        .zip(base_weights)
        .filter(|(s, _)| s.is_some())
        .map(|(_, w)| w)
        .sum();
    if available_weight <= 0.0 {
        return Err(ValuationError::ValuationFailed(format!(
            "all DCF scenarios failed for {}",
            input.ticker
        )));
    }

    let mut scenario_weights = HashMap::new();
    let mut weighted_intrinsic_value = 0.0;
    for ((scenario, p), w) in scenarios.iter().zip(&params).zip(base_weights) {
        if let Some(s) = scenario {
            let weight = w / available_weight;
            weighted_intrinsic_value += s.intrinsic_value_per_share * weight;
            scenario_weights.insert(p.name.to_string(), weight);
        }
    }

    // Sensitivity re-runs the base case with shifted WACC; the terminal
    // clamp applies to these runs as well.
    let mut sensitivity_to_wacc = HashMap::new();
    let base_params = &params[1];
    for (label, shifted) in [
        ("wacc_minus_1pct", wacc - 0.01),
        ("wacc_plus_1pct", wacc + 0.01),
    ] {
        if let Ok(s) = project_scenario(input, base_params, shifted, tax_rate) {
            sensitivity_to_wacc.insert(label.to_string(), s.intrinsic_value_per_share);
        }
    }

    let mut it = scenarios.into_iter();
    Ok(DcfValuation {
        calculation_timestamp: Utc::now(),
        methodology: "Discounted Cash Flow (FCFF)".to_string(),
        risk_free_rate: components.risk_free_rate,
        beta: components.beta,
        equity_risk_premium: components.equity_risk_premium,
        cost_of_equity: components.cost_of_equity,
        cost_of_debt_pretax: components.cost_of_debt_pretax,
        tax_rate,
        cost_of_debt_aftertax: components.cost_of_debt_aftertax,
        debt_weight: components.debt_weight,
        equity_weight: components.equity_weight,
        wacc,
        conservative: it.next().flatten(),
        base_case: it.next().flatten(),
        optimistic: it.next().flatten(),
        scenario_weights,
        weighted_intrinsic_value,
        sensitivity_to_wacc,
        // Reserved: growth sensitivity is declared but not computed.
        sensitivity_to_growth: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_input;
    use crate::wacc::calculate_wacc;

    #[test]
    fn scenario_params_derived_from_history() {
        let mut input = sample_input();
        input.revenue_growth_5y_cagr = Some(0.08);
        let [conservative, base, optimistic] = scenario_params(&input);

        assert!((conservative.growth - 0.04).abs() < 1e-12);
        assert!((base.growth - 0.08).abs() < 1e-12);
        assert!((optimistic.growth - 0.12).abs() < 1e-12);
        assert!((conservative.operating_margin - 0.30 * 0.85).abs() < 1e-12);
        assert!((optimistic.operating_margin - 0.30 * 1.15).abs() < 1e-12);
        assert!((base.terminal_growth - 0.025).abs() < 1e-12);
    }

    #[test]
    fn scenario_params_clamp_extremes() {
        let mut input = sample_input();
        input.revenue_growth_5y_cagr = Some(0.30);
        input.operating_margin = 0.40;
        let [conservative, _, optimistic] = scenario_params(&input);
        assert!((optimistic.growth - 0.25).abs() < 1e-12);
        assert!((optimistic.operating_margin - 0.35).abs() < 1e-12);
        assert!(conservative.growth >= 0.02);
    }

    #[test]
    fn negative_history_floors_base_growth() {
        let mut input = sample_input();
        input.revenue_growth_5y_cagr = Some(-0.10);
        let [_, base, _] = scenario_params(&input);
        assert!((base.growth - 0.03).abs() < 1e-12);
    }

    #[test]
    fn growth_decays_monotonically_toward_terminal() {
        let input = sample_input();
        let params = ScenarioParams {
            name: "base_case",
            growth: 0.08,
            terminal_growth: 0.025,
            operating_margin: 0.30,
        };
        let s = project_scenario(&input, &params, 0.09, 0.21).unwrap();

        let mut growths = Vec::new();
        let mut prev = input.ttm_revenue;
        for r in &s.projected_revenue {
            growths.push(r / prev - 1.0);
            prev = *r;
        }
        for pair in growths.windows(2) {
            assert!(pair[1] < pair[0]);
        }
        // Gap to terminal halves by year 5 but never reaches it.
        assert!(*growths.last().unwrap() > 0.025);
        let expected_y5 = 0.08 - (0.08 - 0.025) * 0.5;
        assert!((growths.last().unwrap() - expected_y5).abs() < 1e-9);
    }

    #[test]
    fn terminal_clamp_engages_iff_wacc_at_or_below_terminal() {
        let input = sample_input();
        let params = ScenarioParams {
            name: "optimistic",
            growth: 0.08,
            terminal_growth: 0.030,
            operating_margin: 0.30,
        };

        let clamped = project_scenario(&input, &params, 0.025, 0.21).unwrap();
        assert!((clamped.terminal_growth_rate - 0.015).abs() < 1e-12);
        assert!(clamped.intrinsic_value_per_share.is_finite());

        let unclamped = project_scenario(&input, &params, 0.09, 0.21).unwrap();
        assert!((unclamped.terminal_growth_rate - 0.030).abs() < 1e-12);
        assert!(unclamped.terminal_growth_rate < unclamped.wacc);
    }

    #[test]
    fn reinvestment_uses_roic_floor() {
        let mut input = sample_input();
        input.roic = -0.05;
        let params = ScenarioParams {
            name: "base_case",
            growth: 0.08,
            terminal_growth: 0.025,
            operating_margin: 0.30,
        };
        let s = project_scenario(&input, &params, 0.09, 0.21).unwrap();
        // Year 1: growth 0.0745, reinvestment 0.745 of NOPAT under the floor.
        let y1_growth = 0.08 - (0.08 - 0.025) * 0.1;
        let expected_fcf = s.projected_nopat[0] * (1.0 - y1_growth / 0.10);
        assert!((s.projected_fcf[0] - expected_fcf).abs() < 1e-6);
    }

    #[test]
    fn weighted_value_uses_fixed_weights() {
        let input = sample_input();
        let components = calculate_wacc(&input, 0.21);
        let mut anomalies = Vec::new();
        let dcf = calculate_dcf(&input, &components, &mut anomalies).unwrap();

        let c = dcf.conservative.as_ref().unwrap().intrinsic_value_per_share;
        let b = dcf.base_case.as_ref().unwrap().intrinsic_value_per_share;
        let o = dcf.optimistic.as_ref().unwrap().intrinsic_value_per_share;
        let expected = 0.25 * c + 0.50 * b + 0.25 * o;
        assert!((dcf.weighted_intrinsic_value - expected).abs() < 1e-9);
        assert_eq!(dcf.scenario_weights.len(), 3);
        assert!(dcf.sensitivity_to_growth.is_empty());
    }

    #[test]
    fn sensitivity_brackets_the_base_case() {
        let input = sample_input();
        let components = calculate_wacc(&input, 0.21);
        let mut anomalies = Vec::new();
        let dcf = calculate_dcf(&input, &components, &mut anomalies).unwrap();

        let base = dcf.base_case.as_ref().unwrap().intrinsic_value_per_share;
        let low_wacc = dcf.sensitivity_to_wacc["wacc_minus_1pct"];
        let high_wacc = dcf.sensitivity_to_wacc["wacc_plus_1pct"];
        // Lower discount rate means higher value.
        assert!(low_wacc > base);
        assert!(high_wacc < base);
    }

    #[test]
    fn all_scenarios_failing_promotes_to_valuation_failed() {
        let mut input = sample_input();
        // Revenue at the float ceiling overflows in year one of every scenario.
        input.ttm_revenue = f64::MAX;
        let components = calculate_wacc(&input, 0.21);
        let mut anomalies = Vec::new();
        let err = calculate_dcf(&input, &components, &mut anomalies).unwrap_err();
        assert!(matches!(err, ValuationError::ValuationFailed(_)));
        // Each scenario left its own anomaly before the promotion.
        assert_eq!(
            anomalies
                .iter()
                .filter(|a| a.contains("unavailable"))
                .count(),
            3
        );
    }

    #[test]
    fn roic_floor_recorded_as_anomaly() {
        let mut input = sample_input();
        input.roic = 0.0;
        let components = calculate_wacc(&input, 0.21);
        let mut anomalies = Vec::new();
        calculate_dcf(&input, &components, &mut anomalies).unwrap();
        assert!(anomalies.iter().any(|a| a.contains("10% floor")));
    }

    #[test]
    fn clamp_scenario_all_finite() {
        // Low Rf and beta push CoE to 2.5%, below the optimistic terminal 3%.
        let mut input = sample_input();
        input.risk_free_rate = 0.01;
        input.beta = Some(0.3);
        let components = calculate_wacc(&input, 0.21);
        assert!((components.cost_of_equity - 0.025).abs() < 1e-12);

        let mut anomalies = Vec::new();
        let dcf = calculate_dcf(&input, &components, &mut anomalies).unwrap();
        for scenario in [&dcf.conservative, &dcf.base_case, &dcf.optimistic] {
            let s = scenario.as_ref().unwrap();
            assert!(s.intrinsic_value_per_share.is_finite());
            assert!(s.terminal_growth_rate < s.wacc);
        }
        let optimistic = dcf.optimistic.as_ref().unwrap();
        assert!((optimistic.terminal_growth_rate - 0.015).abs() < 1e-12);
    }
}
