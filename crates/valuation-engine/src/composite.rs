use valuation_core::ValuationVerdict;

const DCF_WEIGHT: f64 = 0.60;
const GRAHAM_WEIGHT: f64 = 0.40;

/// Blend the probability-weighted DCF value with the Graham Number.
///
/// The 60/40 split applies unconditionally; a zero Graham Number simply
/// contributes nothing to its 40% leg.
pub fn composite_value(dcf_weighted_value: f64, graham_number: f64) -> (f64, String) {
    let composite = DCF_WEIGHT * dcf_weighted_value + GRAHAM_WEIGHT * graham_number;
    let methodology = format!(
        "{:.0}% DCF + {:.0}% Graham Number",
        DCF_WEIGHT * 100.0,
        GRAHAM_WEIGHT * 100.0
    );
    (composite, methodology)
}

/// Upside of intrinsic value over the market price.
pub fn upside_pct(intrinsic_value: f64, current_price: f64) -> f64 {
    if current_price > 0.0 {
        (intrinsic_value - current_price) / current_price
    } else {
        0.0
    }
}

/// Margin of safety: the discount of price to value, upside / (1 + upside).
/// Below the -100% floor the sentinel -1 is returned.
pub fn margin_of_safety(upside: f64) -> f64 {
    if upside > -1.0 {
        upside / (1.0 + upside)
    } else {
        -1.0
    }
}

pub fn verdict(upside: f64) -> ValuationVerdict {
    ValuationVerdict::from_upside(upside)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_is_sixty_forty() {
        let (value, methodology) = composite_value(150.0, 100.0);
        assert!((value - 130.0).abs() < 1e-12);
        assert_eq!(methodology, "60% DCF + 40% Graham Number");
    }

    #[test]
    fn zero_graham_number_still_weighted() {
        // Negative EPS leaves the Graham leg at zero, not redistributed.
        let (value, _) = composite_value(150.0, 0.0);
        assert!((value - 90.0).abs() < 1e-12);
    }

    #[test]
    fn margin_of_safety_formula() {
        let upside = 0.5;
        assert!((margin_of_safety(upside) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(margin_of_safety(-1.0), -1.0);
        assert_eq!(margin_of_safety(-1.5), -1.0);
        assert_eq!(margin_of_safety(0.0), 0.0);
    }

    #[test]
    fn upside_guard_on_zero_price() {
        assert_eq!(upside_pct(100.0, 0.0), 0.0);
        assert!((upside_pct(130.0, 100.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn composite_error_bound_matches_definition() {
        // |composite - (0.6 dcf + 0.4 gn)| stays within 1e-6 relative error.
        let dcf = 123.456789;
        let gn = 98.7654321;
        let (value, _) = composite_value(dcf, gn);
        let expected = 0.6 * dcf + 0.4 * gn;
        assert!(((value - expected) / expected).abs() < 1e-6);
    }
}
