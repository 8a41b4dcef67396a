use valuation_core::{StandardizedValuationInput, ValuationResult};

/// Persona prompt for the memo model. The analyst reads computed numbers;
/// it never produces its own arithmetic.
pub const ANALYST_SYSTEM_PROMPT: &str = r#"You are a veteran value-investor analyst writing an internal investment memo. You think in terms of durable competitive advantages, owner earnings, margin of safety, management quality, and long holding periods.

RULES:
- Every numeric figure in your memo MUST be copied from the QUANTITATIVE RESULTS section verbatim. Do not compute, round differently, or invent numbers.
- Assess the business qualitatively: moats, management, risks, catalysts.
- Be direct about concerns; an honest "avoid" is more valuable than a hedged "buy".
- Respond with a single JSON object matching the memo schema. No prose outside JSON, no markdown fences."#;

const MEMO_SCHEMA_OUTLINE: &str = r#"{
  "ticker": "string",
  "company_name": "string",
  "analysis_date": "ISO 8601 UTC",
  "one_sentence_thesis": "string",
  "investment_thesis": "2-3 paragraphs",
  "competitive_advantages": [
    {
      "moat_type": "brand|network_effects|cost_advantage|switching_costs|efficient_scale|intangible_assets|none",
      "description": "string",
      "durability": "narrow|wide|eroding",
      "evidence": ["2-4 bullet points"],
      "confidence": 0.0
    }
  ],
  "moat_summary": "string",
  "moat_durability": "none|narrow|wide",
  "management_assessment": "string",
  "management_integrity_score": 7,
  "owner_oriented": true,
  "valuation_narrative": "string",
  "margin_of_safety_assessment": "string",
  "key_positives": ["3-7 bullet points"],
  "key_concerns": ["2-5 bullet points"],
  "key_risks": [
    {
      "category": "market|regulatory|competitive|operational|financial",
      "title": "string",
      "description": "string",
      "severity": "low|medium|high|critical",
      "probability": "unlikely|possible|likely|very_likely",
      "mitigation": "string|null"
    }
  ],
  "potential_catalysts": ["2-5 bullet points"],
  "ideal_holding_period": "3-5 years|5-10 years|forever",
  "investment_rating": "strong_buy|buy|hold|sell|strong_sell",
  "conviction_level": 0.0,
  "risk_level": "low|moderate|high|very_high",
  "suitable_for": ["value_investors", "..."],
  "closing_quote": "string",
  "final_thoughts": "string",
  "model_used": "string"
}"#;

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Assemble the analyst prompt. Quantitative figures are substituted from
/// the ValuationResult so the memo cannot drift from the engine's numbers.
pub fn build_analysis_prompt(
    input: &StandardizedValuationInput,
    valuation: &ValuationResult,
    narrative: Option<&str>,
) -> String {
    let screen = &valuation.graham_defensive_screen;
    let mut prompt = String::with_capacity(8 * 1024);

    prompt.push_str(&format!(
        "Write the investment memo for {} ({}).\n\nMEMO SCHEMA:\n{}\n\n",
        valuation.company_name, valuation.ticker, MEMO_SCHEMA_OUTLINE
    ));

    prompt.push_str("QUANTITATIVE RESULTS (authoritative - copy figures verbatim):\n");
    prompt.push_str(&format!("- Current price: ${:.2}\n", valuation.current_price));
    prompt.push_str(&format!(
        "- Composite intrinsic value: ${:.2} ({})\n",
        valuation.composite_intrinsic_value, valuation.composite_methodology
    ));
    prompt.push_str(&format!(
        "- Upside/downside: {}\n",
        pct(valuation.upside_downside_pct)
    ));
    prompt.push_str(&format!(
        "- Margin of safety: {}\n",
        pct(valuation.margin_of_safety)
    ));
    prompt.push_str(&format!("- Verdict: {}\n", valuation.verdict.to_label()));
    prompt.push_str(&format!(
        "- Weighted DCF value: ${:.2} (WACC {})\n",
        valuation.dcf_valuation.weighted_intrinsic_value,
        pct(valuation.dcf_valuation.wacc)
    ));
    prompt.push_str(&format!(
        "- Graham Number: ${:.2}\n",
        valuation.graham_number.graham_number
    ));
    prompt.push_str(&format!(
        "- Graham defensive screen: {}/{} criteria, passes: {}\n",
        screen.criteria_passed, screen.total_criteria, screen.passes_screen
    ));
    prompt.push_str(&format!(
        "- Data confidence: {:.2}\n",
        valuation.data_quality_score
    ));

    prompt.push_str("\nFUNDAMENTALS:\n");
    prompt.push_str(&format!(
        "- TTM revenue ${:.0}M, operating margin {}, net margin {}\n",
        input.ttm_revenue / 1.0e6,
        pct(input.operating_margin),
        pct(input.net_margin)
    ));
    prompt.push_str(&format!(
        "- ROE {}, ROIC {}, current ratio {:.2}\n",
        pct(input.roe),
        pct(input.roic),
        input.current_ratio
    ));
    prompt.push_str(&format!(
        "- Net debt ${:.0}M, interest coverage {}\n",
        input.net_debt / 1.0e6,
        input
            .interest_coverage
            .map(|ic| format!("{:.1}x", ic))
            .unwrap_or_else(|| "n/a".to_string())
    ));
    if let Some(growth) = input.revenue_growth_5y_cagr {
        prompt.push_str(&format!("- Revenue 5y CAGR {}\n", pct(growth)));
    }

    if !valuation.risk_factors.is_empty() {
        prompt.push_str("\nENGINE RISK FLAGS:\n");
        for risk in &valuation.risk_factors {
            prompt.push_str(&format!("- {}\n", risk));
        }
    }

    if let Some(description) = narrative {
        prompt.push_str("\nBUSINESS DESCRIPTION:\n");
        prompt.push_str(description);
        prompt.push('\n');
    }

    prompt.push_str("\nReturn the single JSON memo object now.");
    prompt
}

/// Feed the parser error back for a corrected response.
pub fn build_memo_repair_prompt(original_prompt: &str, parse_error: &str) -> String {
    format!(
        "{}\n\nYour previous response failed schema validation with this error:\n{}\n\nReturn a corrected single JSON object.",
        original_prompt, parse_error
    )
}
