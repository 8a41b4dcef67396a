use valuation_core::{GrahamDefensiveScreen, GrahamNumber, StandardizedValuationInput};

const GRAHAM_MULTIPLIER: f64 = 22.5;
const MIN_REVENUE: f64 = 700_000_000.0;
const MIN_CURRENT_RATIO: f64 = 2.0;
const MIN_POSITIVE_YEARS: usize = 10;
const MIN_DIVIDEND_YEARS: u32 = 20;
const MIN_EPS_10Y_GROWTH: f64 = 0.33;
const MAX_PE: f64 = 15.0;
const MAX_PB: f64 = 1.5;
const MAX_PE_PB_PRODUCT: f64 = 22.5;
const MIN_CRITERIA_PASS: u32 = 5;
const TOTAL_CRITERIA: u32 = 7;

/// Graham Number: sqrt(22.5 * EPS * BVPS), defined only for positive EPS
/// and book value. The upside sentinel is -1 when not applicable.
pub fn calculate_graham_number(input: &StandardizedValuationInput) -> GrahamNumber {
    let eps = input.ttm_eps;
    let bvps = if input.shares_outstanding > 0.0 {
        input.shareholders_equity / input.shares_outstanding
    } else {
        0.0
    };

    let graham_number = if eps > 0.0 && bvps > 0.0 {
        (GRAHAM_MULTIPLIER * eps * bvps).sqrt()
    } else {
        tracing::debug!(
            "Graham Number not applicable for {} (eps {:.2}, bvps {:.2})",
            input.ticker,
            eps,
            bvps
        );
        0.0
    };

    let upside_pct = if graham_number > 0.0 && input.current_price > 0.0 {
        (graham_number - input.current_price) / input.current_price
    } else {
        -1.0
    };

    GrahamNumber {
        eps_ttm: eps,
        book_value_per_share: bvps,
        graham_multiplier: GRAHAM_MULTIPLIER,
        graham_number,
        current_price: input.current_price,
        upside_pct,
    }
}

/// EPS growth over ten years: endpoint ratio from history when ten annual
/// entries exist, otherwise expanded from the 10-year CAGR.
fn eps_10y_growth(input: &StandardizedValuationInput) -> Option<f64> {
    let hist = &input.historical_financials;
    if hist.len() >= 10 {
        let newest = hist.first()?.eps;
        let oldest = hist.last()?.eps;
        if oldest > 0.0 {
            return Some((newest - oldest) / oldest);
        }
    }
    input
        .earnings_growth_10y_cagr
        .map(|cagr| (1.0 + cagr).powi(10) - 1.0)
}

/// Graham's seven defensive-investor criteria.
///
/// Criteria 6 and 7 each also count as passed when the P/E * P/B product
/// stays under 22.5 (Graham's combined test). Passing the screen requires
/// five of seven.
pub fn calculate_graham_screen(input: &StandardizedValuationInput) -> GrahamDefensiveScreen {
    let adequate_size = input.ttm_revenue >= MIN_REVENUE;

    let strong_financial_condition = input.current_ratio >= MIN_CURRENT_RATIO;

    let years_positive_earnings = input.years_positive_earnings();
    let earnings_stability = years_positive_earnings >= MIN_POSITIVE_YEARS;

    // The full twenty-year dividend record is never observable from ten
    // years of history; a positive yield defaults the record and the value
    // is flagged as estimated rather than verified.
    let has_dividend = input.dividend_yield.map(|y| y > 0.0).unwrap_or(false);
    let (years_dividends_paid, dividend_years_estimated) = if has_dividend {
        (MIN_DIVIDEND_YEARS, true)
    } else {
        (0, false)
    };
    let dividend_record = years_dividends_paid >= MIN_DIVIDEND_YEARS;

    let growth = eps_10y_growth(input);
    let earnings_growth = growth.map(|g| g >= MIN_EPS_10Y_GROWTH).unwrap_or(false);

    let pe = input.pe_ratio;
    let moderate_pe = pe.map(|p| p > 0.0 && p <= MAX_PE).unwrap_or(false);

    let pb = input.price_to_book;
    let moderate_pb = pb.map(|p| p > 0.0 && p <= MAX_PB).unwrap_or(false);

    let graham_product = match (pe, pb) {
        (Some(pe), Some(pb)) if pe > 0.0 && pb > 0.0 => Some(pe * pb),
        _ => None,
    };
    let graham_product_passes = graham_product.map(|p| p < MAX_PE_PB_PRODUCT).unwrap_or(false);

    let criteria_passed = [
        adequate_size,
        strong_financial_condition,
        earnings_stability,
        dividend_record,
        earnings_growth,
        moderate_pe || graham_product_passes,
        moderate_pb || graham_product_passes,
    ]
    .iter()
    .filter(|&&passed| passed)
    .count() as u32;

    GrahamDefensiveScreen {
        adequate_size,
        actual_revenue: input.ttm_revenue,
        strong_financial_condition,
        actual_current_ratio: input.current_ratio,
        earnings_stability,
        years_positive_earnings,
        dividend_record,
        years_dividends_paid,
        dividend_years_estimated,
        earnings_growth,
        eps_10y_growth: growth,
        moderate_pe,
        actual_pe: pe,
        moderate_pb,
        actual_pb: pb,
        graham_product,
        graham_product_passes,
        criteria_passed,
        total_criteria: TOTAL_CRITERIA,
        passes_screen: criteria_passed >= MIN_CRITERIA_PASS,
    }
}
