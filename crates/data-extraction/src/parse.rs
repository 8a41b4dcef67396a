use valuation_core::StandardizedValuationInput;

/// Error from the single SVI validation boundary. Carried as a plain string
/// so it can be fed back verbatim into the repair prompt.
#[derive(Debug, Clone)]
pub struct SchemaError(pub String);

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strip markdown fences and slice to the outermost JSON object.
fn isolate_json(response: &str) -> Result<&str, SchemaError> {
    let mut cleaned = response.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    let cleaned = cleaned.trim();

    let start = cleaned
        .find('{')
        .ok_or_else(|| SchemaError("no JSON object found in response".to_string()))?;
    let end = cleaned
        .rfind('}')
        .ok_or_else(|| SchemaError("no JSON object found in response".to_string()))?;
    if end < start {
        return Err(SchemaError("no JSON object found in response".to_string()));
    }
    Ok(&cleaned[start..=end])
}

/// Parse and validate a raw model response into an SVI.
///
/// This is the only place raw model output is interpreted; no code past
/// this boundary handles untyped maps.
pub fn parse_svi(response: &str) -> Result<StandardizedValuationInput, SchemaError> {
    let json = isolate_json(response)?;

    let mut svi: StandardizedValuationInput = serde_json::from_str(json)
        .map_err(|e| SchemaError(format!("schema validation failed: {}", e)))?;

    svi.ticker = svi.ticker.trim().to_uppercase();
    if svi.ticker.is_empty() {
        return Err(SchemaError("ticker is empty".to_string()));
    }
    if !(svi.current_price > 0.0) {
        return Err(SchemaError(format!(
            "current_price must be positive, got {}",
            svi.current_price
        )));
    }
    if !(svi.shares_outstanding > 0.0) {
        return Err(SchemaError(format!(
            "shares_outstanding must be positive, got {}",
            svi.shares_outstanding
        )));
    }
    if !(svi.ttm_revenue > 0.0) {
        return Err(SchemaError(format!(
            "ttm_revenue must be positive, got {}",
            svi.ttm_revenue
        )));
    }
    if !(0.0..=1.0).contains(&svi.data_confidence_score) {
        return Err(SchemaError(format!(
            "data_confidence_score out of [0,1]: {}",
            svi.data_confidence_score
        )));
    }
    if !(0.0..=0.20).contains(&svi.risk_free_rate) {
        return Err(SchemaError(format!(
            "risk_free_rate out of [0, 0.20]: {}",
            svi.risk_free_rate
        )));
    }
    if !(0.01..=0.15).contains(&svi.equity_risk_premium) {
        return Err(SchemaError(format!(
            "equity_risk_premium out of [0.01, 0.15]: {}",
            svi.equity_risk_premium
        )));
    }
    for value in [
        svi.market_cap,
        svi.ttm_operating_income,
        svi.ttm_net_income,
        svi.ttm_eps,
        svi.shareholders_equity,
        svi.total_debt,
        svi.total_cash,
    ] {
        if !value.is_finite() {
            return Err(SchemaError("non-finite numeric field".to_string()));
        }
    }

    if svi.historical_financials.len() > 10 {
        svi.historical_financials.truncate(10);
    }
    // Most recent first regardless of how the model ordered them.
    svi.historical_financials
        .sort_by(|a, b| b.fiscal_year.cmp(&a.fiscal_year));

    Ok(svi)
}
