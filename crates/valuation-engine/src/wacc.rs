use valuation_core::{StandardizedValuationInput, WaccComponents};

/// Credit spread over the risk-free rate by interest-coverage band.
///
/// Bands follow typical rating-implied spreads: distressed through AA/AAA.
pub fn credit_spread(interest_coverage: Option<f64>) -> f64 {
    let ic = match interest_coverage {
        Some(ic) if ic > 0.0 => ic,
        _ => return 0.050,
    };

    if ic < 1.5 {
        0.040
    } else if ic < 3.0 {
        0.030
    } else if ic < 5.0 {
        0.020
    } else if ic < 8.0 {
        0.015
    } else if ic < 12.0 {
        0.010
    } else {
        0.007
    }
}

/// Weighted average cost of capital.
///
/// CoE from CAPM, CoD from the coverage spread table, weights over
/// E + D. A firm with no capital at market value is treated as all-equity.
pub fn calculate_wacc(input: &StandardizedValuationInput, tax_rate: f64) -> WaccComponents {
    let beta = input.beta_or_default();
    let cost_of_equity = input.risk_free_rate + beta * input.equity_risk_premium;

    let spread = credit_spread(input.interest_coverage);
    let cost_of_debt_pretax = input.risk_free_rate + spread;
    let cost_of_debt_aftertax = cost_of_debt_pretax * (1.0 - tax_rate);

    let market_cap = input.market_cap.max(0.0);
    let total_debt = input.total_debt.max(0.0);
    let total_capital = market_cap + total_debt;

    let (equity_weight, debt_weight) = if total_capital <= 0.0 {
        (1.0, 0.0)
    } else {
        (market_cap / total_capital, total_debt / total_capital)
    };

    let wacc = equity_weight * cost_of_equity + debt_weight * cost_of_debt_aftertax;

    tracing::debug!(
        "WACC for {}: {:.2}% (CoE {:.2}%, CoD after-tax {:.2}%)",
        input.ticker,
        wacc * 100.0,
        cost_of_equity * 100.0,
        cost_of_debt_aftertax * 100.0,
    );

    WaccComponents {
        risk_free_rate: input.risk_free_rate,
        beta,
        equity_risk_premium: input.equity_risk_premium,
        cost_of_equity,
        credit_spread: spread,
        cost_of_debt_pretax,
        tax_rate,
        cost_of_debt_aftertax,
        equity_weight,
        debt_weight,
        wacc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_input;

    #[test]
    fn spread_bands() {
        assert_eq!(credit_spread(None), 0.050);
        assert_eq!(credit_spread(Some(-1.0)), 0.050);
        assert_eq!(credit_spread(Some(0.0)), 0.050);
        assert_eq!(credit_spread(Some(1.0)), 0.040);
        assert_eq!(credit_spread(Some(2.0)), 0.030);
        assert_eq!(credit_spread(Some(4.0)), 0.020);
        assert_eq!(credit_spread(Some(6.0)), 0.015);
        assert_eq!(credit_spread(Some(10.0)), 0.010);
        assert_eq!(credit_spread(Some(12.0)), 0.007);
        assert_eq!(credit_spread(Some(50.0)), 0.007);
    }

    #[test]
    fn all_equity_wacc_equals_cost_of_equity() {
        let mut input = sample_input();
        input.total_debt = 0.0;
        let components = calculate_wacc(&input, 0.21);
        assert!((components.wacc - components.cost_of_equity).abs() < 1e-12);
        assert!((components.equity_weight - 1.0).abs() < 1e-12);
        assert_eq!(components.debt_weight, 0.0);
        // Rf 0.04 + 1.0 * 0.05
        assert!((components.cost_of_equity - 0.09).abs() < 1e-12);
    }

    #[test]
    fn levered_wacc_blends_both_costs() {
        let mut input = sample_input();
        input.market_cap = 800.0;
        input.total_debt = 200.0;
        input.interest_coverage = Some(10.0);
        let c = calculate_wacc(&input, 0.21);

        assert!((c.equity_weight - 0.8).abs() < 1e-12);
        assert!((c.debt_weight - 0.2).abs() < 1e-12);
        let expected = 0.8 * c.cost_of_equity + 0.2 * (0.04 + 0.010) * 0.79;
        assert!((c.wacc - expected).abs() < 1e-12);
        // WACC dominates each weighted leg.
        assert!(c.wacc >= c.cost_of_debt_aftertax * c.debt_weight);
        assert!(c.wacc >= c.cost_of_equity * c.equity_weight - 1e-12);
    }

    #[test]
    fn zero_capital_treated_as_all_equity() {
        let mut input = sample_input();
        input.market_cap = 0.0;
        input.total_debt = 0.0;
        let c = calculate_wacc(&input, 0.21);
        assert!((c.equity_weight - 1.0).abs() < 1e-12);
        assert!((c.wacc - c.cost_of_equity).abs() < 1e-12);
    }
}
