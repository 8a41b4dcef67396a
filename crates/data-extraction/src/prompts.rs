use stock_data::TruncatedSource;

/// System prompt for the extraction model. The model normalizes and maps
/// fields; it performs no valuation arithmetic.
pub const SYSTEM_PROMPT: &str = r#"You are a financial data extraction engine. You receive sections of a raw, noisy financial data file for one company and must produce a single JSON object matching the StandardizedValuationInput schema. Respond with JSON only - no prose, no markdown fences.

UNITS AND CONVENTIONS:
- All monetary values in USD.
- All ratios as decimals (15% = 0.15).
- All growth rates as annualized CAGRs.

FIELD NAME NORMALIZATION (treat as the same field):
- Revenue = Net Sales = Total Revenue = Sales
- Net Income = Net Earnings = Profit
- Operating Income = EBIT = Operating Profit
- Free Cash Flow = FCF = Levered Free Cash Flow
- Shareholders Equity = Stockholders Equity = Total Equity

TTM RULES:
- Income statement and cash flow TTM values are the sum of the last 4 quarters.
- Balance sheet items are the latest quarterly snapshot, never summed.

CAGR over N years: (end / start)^(1/N) - 1. If the start value is <= 0, emit null. List the field in "estimated_fields" only when you used a fallback derivation; otherwise list it in "missing_fields".

SOURCE PRIORITY when sections conflict:
1. Annual financials
2. Quarterly statement blocks
3. Pre-calculated metrics
4. Aggregated valuation ratios
5. Real-time market snapshot

NEVER FABRICATE. When a field cannot be derived from the provided data, emit null and add its name to "missing_fields".

DATA QUALITY:
- "data_confidence_score" in [0, 1] reflects completeness x consistency x recency of the source sections.
- Record conflicts between sections and suspicious values in "data_anomalies".
- Reduce confidence when quality notes report missing quarterly statements."#;

/// Schema sketch embedded in the user prompt. Kept as a literal so the
/// prompt stays in sync with the serde model by inspection.
const SCHEMA_OUTLINE: &str = r#"{
  "ticker": "string",
  "company_name": "string",
  "sector": "string|null",
  "industry": "string|null",
  "extraction_timestamp": "ISO 8601 UTC",
  "data_confidence_score": 0.0,
  "current_price": 0.0,
  "shares_outstanding": 0.0,
  "market_cap": 0.0,
  "enterprise_value": 0.0,
  "ttm_revenue": 0.0,
  "ttm_operating_income": 0.0,
  "ttm_net_income": 0.0,
  "ttm_eps": 0.0,
  "ttm_ebitda": 0.0,
  "ttm_free_cash_flow": 0.0,
  "cash_and_equivalents": 0.0,
  "total_cash": 0.0,
  "total_debt": 0.0,
  "net_debt": 0.0,
  "shareholders_equity": 0.0,
  "current_ratio": 0.0,
  "gross_margin": 0.0,
  "operating_margin": 0.0,
  "net_margin": 0.0,
  "roe": 0.0,
  "roic": 0.0,
  "debt_to_equity": "number|null",
  "interest_coverage": "number|null",
  "pe_ratio": "number|null",
  "price_to_book": "number|null",
  "dividend_yield": "number|null",
  "revenue_growth_1y": "number|null",
  "revenue_growth_3y_cagr": "number|null",
  "revenue_growth_5y_cagr": "number|null",
  "revenue_growth_10y_cagr": "number|null",
  "earnings_growth_3y_cagr": "number|null",
  "earnings_growth_5y_cagr": "number|null",
  "earnings_growth_10y_cagr": "number|null",
  "beta": "number|null",
  "risk_free_rate": 0.0,
  "equity_risk_premium": 0.05,
  "historical_financials": [
    {
      "fiscal_year": 2025,
      "revenue": 0.0,
      "operating_income": "number|null",
      "net_income": 0.0,
      "eps": 0.0,
      "free_cash_flow": "number|null",
      "dividends_paid": "number|null",
      "shareholders_equity": "number|null"
    }
  ],
  "missing_fields": ["string"],
  "estimated_fields": ["string"],
  "data_anomalies": ["string"]
}"#;

fn section_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Assemble the extraction user prompt from the truncated source sections.
pub fn build_extraction_prompt(truncated: &TruncatedSource) -> String {
    let mut prompt = String::with_capacity(24 * 1024);

    prompt.push_str(&format!(
        "Extract the StandardizedValuationInput for {} ({}), data collected at {}.\n\n",
        truncated.ticker, truncated.company_name, truncated.collected_at
    ));
    prompt.push_str("TARGET SCHEMA:\n");
    prompt.push_str(SCHEMA_OUTLINE);
    prompt.push_str("\n\nCOMPANY INFO:\n");
    prompt.push_str(&section_json(&truncated.company_info));
    prompt.push_str("\n\nMARKET DATA:\n");
    prompt.push_str(&section_json(&truncated.market_data));
    prompt.push_str("\n\nVALUATION RATIOS:\n");
    prompt.push_str(&section_json(&truncated.valuation));
    prompt.push_str("\n\nCALCULATED METRICS:\n");
    prompt.push_str(&section_json(&truncated.calculated_metrics));
    prompt.push_str("\n\nANNUAL FINANCIALS (by fiscal year):\n");
    prompt.push_str(&section_json(&truncated.financials_annual));
    prompt.push_str("\n\nQUARTERLY INCOME STATEMENTS:\n");
    prompt.push_str(&section_json(&truncated.income_statement_quarterly));
    prompt.push_str("\n\nLATEST QUARTERLY BALANCE SHEET:\n");
    prompt.push_str(&section_json(&truncated.balance_sheet_latest));
    prompt.push_str("\n\nQUARTERLY CASH FLOW STATEMENTS:\n");
    prompt.push_str(&section_json(&truncated.cash_flow_quarterly));

    if !truncated.quality_notes.is_empty() {
        prompt.push_str("\n\nQUALITY NOTES (reflect in data_confidence_score):\n");
        for note in &truncated.quality_notes {
            prompt.push_str(&format!("- {}\n", note));
        }
    }

    prompt.push_str("\nReturn the single JSON object now.");
    prompt
}

/// Follow-up prompt after a schema validation failure: the parser error is
/// fed back so the model can correct its output.
pub fn build_repair_prompt(original_prompt: &str, parse_error: &str) -> String {
    format!(
        "{}\n\nYour previous response failed schema validation with this error:\n{}\n\nReturn a corrected single JSON object that conforms to the schema.",
        original_prompt, parse_error
    )
}
